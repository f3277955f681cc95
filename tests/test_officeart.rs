
use fixtures::*;
use olecarve::officeart::{METAFILE_SECOND_DIGEST_INSTANCES, RASTER_SECOND_DIGEST_INSTANCES};
use olecarve::{
    BlipKind, BlipSubtype, DeserializationError, ExtractionSettings, OfficeArtParser,
    SecondaryDigest, extract_images,
};
use pretty_assertions::assert_eq;

const RASTER_TYPES: [(u16, BlipSubtype); 5] = [
    (0xF01D, BlipSubtype::Jpeg),
    (0xF02A, BlipSubtype::Jpeg),
    (0xF01E, BlipSubtype::Png),
    (0xF01F, BlipSubtype::Dib),
    (0xF029, BlipSubtype::Tiff),
];

#[test]
fn test_emits_every_injected_raster_image() {
    ensure_env_logger_initialized();

    let mut stream = Vec::new();
    let mut expected = Vec::new();
    for (i, (record_type, subtype)) in RASTER_TYPES.iter().enumerate() {
        let payload: Vec<u8> = (0..(20 + i * 7)).map(|b| (b * 31 + i) as u8).collect();
        let mut records = shape_container();
        records.extend(fbse(None, &raster_blip(*record_type, 0x46A, false, &payload)));
        stream.extend(picture_element(&records));
        expected.push((*subtype, payload));
    }

    let images = extract_images(&stream);
    assert_eq!(images.len(), expected.len());
    for (image, (subtype, payload)) in images.iter().zip(expected) {
        assert_eq!(image.kind, BlipKind::Raster);
        assert_eq!(image.subtype, subtype);
        assert_eq!(image.payload, payload);
        assert!(!image.compressed);
    }
}

#[test]
fn test_rejected_elements_are_skipped_whole() {
    ensure_env_logger_initialized();

    let hidden = fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"not me"));
    let wanted = fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"me"));

    let mut stream = Vec::new();
    stream.extend(picture_element_with(0x45, MM_SHAPE, 0, None, &hidden));
    stream.extend(picture_element_with(0x44, 0x08, 0, None, &hidden));
    stream.extend(picture_element_with(0x44, MM_SHAPE, 3, None, &hidden));
    stream.extend(picture_element(&wanted));

    let results: Vec<_> = OfficeArtParser::from_buffer(&stream).images().collect();
    assert_eq!(results.len(), 1);
    let image = results[0].as_ref().unwrap();
    assert_eq!(image.payload, b"me".to_vec());
}

#[test]
fn test_raster_payload_length_for_every_sentinel() {
    let mut instances = RASTER_SECOND_DIGEST_INSTANCES.to_vec();
    instances.push(0x46A);

    for instance in instances {
        let second = RASTER_SECOND_DIGEST_INSTANCES.contains(&instance);
        let payload = vec![0xEE; 40];
        let blip = raster_blip(0xF01D, instance, second, &payload);
        let declared = blip.len() - 8;

        let images = extract_images(&picture_element(&fbse(None, &blip)));
        assert_eq!(images.len(), 1, "instance {:#x}", instance);
        let image = &images[0];
        let digest = if second { 16 } else { 0 };
        assert_eq!(image.payload.len(), declared - 17 - digest);
        assert_eq!(image.payload, payload);
        assert_eq!(image.secondary_digest.len(), digest);
        assert_eq!(image.instance, instance);
    }
}

#[test]
fn test_metafile_payload_length_for_every_sentinel() {
    let settings_and_width = [(SecondaryDigest::Full, 16), (SecondaryDigest::Legacy, 6)];
    let mut instances = METAFILE_SECOND_DIGEST_INSTANCES.to_vec();
    instances.push(0x3D4);

    for (setting, width) in settings_and_width {
        for &instance in &instances {
            let second = METAFILE_SECOND_DIGEST_INSTANCES.contains(&instance);
            let digest = if second { width } else { 0 };
            let payload = vec![0x78, 0x9C, 0x03, 0x00, 0x00, 0x00, 0x00, 0x01];
            let blip = metafile_blip(0xF01A, instance, digest, 0x00, &payload);
            let declared = blip.len() - 8;

            let settings = ExtractionSettings::new().metafile_digest(setting);
            let stream = picture_element(&fbse(None, &blip));
            let images: Vec<_> = OfficeArtParser::from_buffer(&stream)
                .with_configuration(settings)
                .images()
                .collect::<Result<_, _>>()
                .unwrap();

            assert_eq!(images.len(), 1);
            let image = &images[0];
            assert_eq!(image.subtype, BlipSubtype::Emf);
            assert_eq!(image.kind, BlipKind::Metafile);
            assert_eq!(image.payload.len(), declared - 50 - digest);
            assert_eq!(image.payload, payload);
            assert!(image.compressed);
            let header = image.metafile.expect("metafile header");
            assert_eq!(header.compressed_size as usize, payload.len());
            assert_eq!(header.bounds, [0, 0, 1000, 800]);
        }
    }
}

#[test]
fn test_length_below_overhead_is_schema_violation() {
    ensure_env_logger_initialized();

    let metafile = record_with_length(0x216, 0xF01B, 49, &[0u8; 49]);
    let raster = record_with_length(0x6E0, 0xF01E, 16, &[0u8; 16]);
    let raster_sentinel = record_with_length(0x6E1, 0xF01E, 20, &[0u8; 20]);

    for blip in [metafile, raster, raster_sentinel] {
        let mut records = fbse(None, &blip);
        records.extend(fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"after")));
        let stream = picture_element(&records);

        let results: Vec<_> = OfficeArtParser::from_buffer(&stream).images().collect();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            results[0],
            Err(DeserializationError::SchemaViolation { .. })
        ));
        assert_eq!(results[1].as_ref().unwrap().payload, b"after".to_vec());
    }
}

#[test]
fn test_overlong_record_is_clamped_to_element() {
    ensure_env_logger_initialized();

    // The FBSE claims far more bytes than the element holds.
    let blip = raster_blip(0xF01F, 0x7A8, false, b"dib");
    let content = fbse(None, &blip)[8..].to_vec();
    let lying = record_with_length(6, 0xF007, 0xFFFF_0000, &content);

    let mut stream = picture_element(&lying);
    stream.extend(picture_element(&fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"png"))));

    let images = extract_images(&stream);
    assert_eq!(images.len(), 2);
    assert_eq!(images[0].payload, b"dib".to_vec());
    assert_eq!(images[1].payload, b"png".to_vec());
}

#[test]
fn test_truncated_blip_is_recovered_at_element_boundary() {
    ensure_env_logger_initialized();

    let mut blip = raster_blip(0xF01E, 0x6E0, false, &[0xAB; 64]);
    blip.truncate(40);
    let mut stream = picture_element(&fbse(None, &blip));
    stream.extend(picture_element(&fbse(None, &raster_blip(0xF01D, 0x46A, false, b"jpg"))));

    let results: Vec<_> = OfficeArtParser::from_buffer(&stream).images().collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0],
        Err(DeserializationError::OutOfBounds { .. })
    ));
    assert_eq!(results[1].as_ref().unwrap().payload, b"jpg".to_vec());
}

#[test]
fn test_picture_and_entry_names_are_reported() {
    let records = fbse(Some("image1.png"), &raster_blip(0xF01E, 0x6E0, false, b"x"));
    let stream = picture_element_with(0x44, MM_SHAPEFILE, 0, Some("logo"), &records);

    let images = extract_images(&stream);
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].picture_name.as_deref(), Some("logo"));
    assert_eq!(images[0].fbse.name.as_deref(), Some("image1.png"));
    assert_eq!(images[0].fbse.ref_count, 1);
}

#[test]
fn test_delay_stream_entry_yields_nothing() {
    let mut records = fbse(None, &[]);
    records.extend(fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"inline")));

    let results: Vec<_> = OfficeArtParser::from_buffer(&picture_element(&records))
        .images()
        .collect();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].as_ref().unwrap().payload, b"inline".to_vec());
}

#[test]
fn test_image_record_serializes_without_payload_bytes() {
    let stream = picture_element(&fbse(None, &raster_blip(0xF01E, 0x6E0, false, &[1, 2, 3, 4])));
    let images = extract_images(&stream);
    let value = serde_json::to_value(&images[0]).unwrap();

    assert_eq!(value["payload_size"], 4);
    assert_eq!(value["kind"], "Raster");
    assert_eq!(value["subtype"], "Png");
    assert_eq!(value["compressed"], false);
}

#[cfg(feature = "inflate")]
#[test]
fn test_decompressed_inflates_metafile_payload() {
    let original = b"metafile bytes metafile bytes metafile bytes";
    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(original, 6);

    let blip = metafile_blip(0xF01B, 0x216, 0, 0x00, &compressed);
    let mut images = extract_images(&picture_element(&fbse(None, &blip)));
    let image = images.remove(0);
    assert!(image.compressed);

    // The fixture declares four times the compressed size as the uncompressed size.
    assert_eq!(image.decompressed().unwrap().as_ref(), &original[..]);
}

#[test]
fn test_nested_entry_is_found_only_when_descent_is_enabled() {
    let nested = record(0xF, 0, 0xF004, &fbse(None, &raster_blip(0xF01E, 0x6E0, false, b"nested")));
    let stream = picture_element(&nested);

    assert_eq!(OfficeArtParser::from_buffer(&stream).images().count(), 0);

    let images: Vec<_> = OfficeArtParser::from_buffer(&stream)
        .with_configuration(ExtractionSettings::new().descend_into_containers(true))
        .images()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].payload, b"nested".to_vec());
}
