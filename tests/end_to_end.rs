//! §8.3 write-then-read scenario, exercised through the public crate API.

use ewf::{default_observer, AcquisitionTarget, EwfHandle, MediaValues, HashSections};
use ewf::format::Config;
use ewf::hash_sections::md5_of;

#[test]
fn write_then_read_one_image() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.E01");

    let media = MediaValues::new(64, 512, 1, 64).unwrap();
    assert_eq!(media.chunk_size, 32768);
    let zeros = vec![0u8; media.chunk_size as usize];

    let mut writer = EwfHandle::new_for_write(Config::default(), media, default_observer());
    writer.write_single_segment_image(&path, &zeros).unwrap();
    drop(writer);

    let mut reader = EwfHandle::open_existing(&path, default_observer()).unwrap();

    let mut readback = vec![0u8; zeros.len()];
    std::io::Read::read_exact(&mut reader, &mut readback).unwrap();
    assert_eq!(readback, zeros);

    let hashes: &HashSections = reader.hash_sections();
    assert!(hashes.md5_hash_set);
    assert_eq!(hashes.md5_hash, md5_of(&zeros));
}

#[test]
fn reopening_reports_media_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.E01");

    let media = MediaValues::new(64, 512, 2, 128).unwrap();
    let data = vec![0xab; (media.chunk_size as usize) * 2];

    let mut writer = EwfHandle::new_for_write(Config::default(), media, default_observer());
    writer.write_single_segment_image(&path, &data).unwrap();
    drop(writer);

    let reader = EwfHandle::open_existing(&path, default_observer()).unwrap();
    assert_eq!(reader.media_values().sectors_per_chunk, 64);
    assert_eq!(reader.media_values().bytes_per_sector, 512);
}

/// Same scenario as `write_then_read_one_image`, but targeting the v2
/// (Ex01-style) container, whose section descriptors trail their payload
/// instead of preceding it (§4.2/§4.3).
#[test]
fn write_then_read_one_image_v2() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("image.Ex01");

    let media = MediaValues::new(64, 512, 1, 64).unwrap();
    let zeros = vec![0u8; media.chunk_size as usize];
    let mut config = Config::default();
    config.target = AcquisitionTarget::Ewf2;

    let mut writer = EwfHandle::new_for_write(config, media, default_observer());
    writer.write_single_segment_image(&path, &zeros).unwrap();
    drop(writer);

    let mut reader = EwfHandle::open_existing(&path, default_observer()).unwrap();

    let mut readback = vec![0u8; zeros.len()];
    std::io::Read::read_exact(&mut reader, &mut readback).unwrap();
    assert_eq!(readback, zeros);

    let hashes: &HashSections = reader.hash_sections();
    assert!(hashes.md5_hash_set);
    assert_eq!(hashes.md5_hash, md5_of(&zeros));
}
