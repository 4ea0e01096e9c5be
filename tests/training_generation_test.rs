use std::fs;
use std::path::Path;

use alarm_finder::config::TrainingConfig;
use alarm_finder::spectrogram::{RenderOptions, Transform};
use alarm_finder::training::TrainingSetGenerator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tempfile::TempDir;

fn write_tone(path: &Path, freq: f32, seconds: f32, sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let len = (seconds * sample_rate as f32) as usize;
    for i in 0..len {
        let t = i as f32 / sample_rate as f32;
        let value = 0.3 * (2.0 * std::f32::consts::PI * freq * t).sin();
        writer.write_sample((value * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn fixture() -> (TempDir, TrainingConfig) {
    let dir = TempDir::new().unwrap();
    let alarms = dir.path().join("alarms");
    let backgrounds = dir.path().join("background");
    fs::create_dir_all(&alarms).unwrap();
    fs::create_dir_all(&backgrounds).unwrap();

    write_tone(&alarms.join("beep.wav"), 3_100.0, 1.5, 48_000);
    write_tone(&backgrounds.join("hum.wav"), 120.0, 4.0, 48_000);
    write_tone(&backgrounds.join("fan.wav"), 400.0, 2.0, 22_050);
    fs::write(backgrounds.join("notes.txt"), "not audio").unwrap();

    let config = TrainingConfig {
        alarm_dir: alarms,
        background_dir: backgrounds,
        output_root: dir.path().join("out"),
        images_per_class: 2,
        transforms: vec![Transform::Wave, Transform::Mel],
        image: RenderOptions {
            width: 96,
            height: 48,
        },
        ..TrainingConfig::default()
    };
    (dir, config)
}

#[test]
fn generates_numbered_tree_for_every_transform_split_and_class() {
    let (_dir, config) = fixture();
    let root = config.output_root.clone();
    let mut generator = TrainingSetGenerator::new(config).unwrap();
    let mut rng = StdRng::seed_from_u64(11);

    let report = generator.generate(&mut rng).unwrap();

    assert_eq!(report.total, 24);
    assert_eq!(
        report.per_transform,
        vec![(Transform::Wave, 12), (Transform::Mel, 12)]
    );
    assert_eq!(report.folders.len(), 12);

    assert!(root.join("wave/train/alarm/img_0.png").is_file());
    assert!(root.join("wave/train/alarm/img_1.png").is_file());
    assert!(root.join("wave/test/alarm/img_2.png").is_file());
    assert!(root.join("wave/train/no_alarm/img_6.png").is_file());
    assert!(root.join("Mel/train/alarm/img_12.png").is_file());
    assert!(root.join("Mel/validate/no_alarm/img_23.png").is_file());

    let png = fs::read(root.join("Mel/train/alarm/img_12.png")).unwrap();
    assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

    // background .txt file is ignored, both wavs are cached
    assert_eq!(generator.mixer().catalog().backgrounds.len(), 2);
    assert!(generator.cache().len() <= 3);
}

#[test]
fn same_seed_reproduces_identical_images() {
    let (_a, mut first) = fixture();
    let (_b, mut second) = fixture();
    first.transforms = vec![Transform::Mel];
    second.transforms = vec![Transform::Mel];

    let first_root = first.output_root.clone();
    let second_root = second.output_root.clone();

    TrainingSetGenerator::new(first)
        .unwrap()
        .generate(&mut StdRng::seed_from_u64(5))
        .unwrap();
    TrainingSetGenerator::new(second)
        .unwrap()
        .generate(&mut StdRng::seed_from_u64(5))
        .unwrap();

    for rel in ["Mel/train/alarm/img_0.png", "Mel/validate/no_alarm/img_11.png"] {
        assert_eq!(
            fs::read(first_root.join(rel)).unwrap(),
            fs::read(second_root.join(rel)).unwrap(),
            "{rel} differs between runs"
        );
    }
}

#[test]
fn missing_source_directory_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = TrainingConfig {
        alarm_dir: dir.path().join("nope"),
        background_dir: dir.path().join("also-nope"),
        output_root: dir.path().join("out"),
        ..TrainingConfig::default()
    };

    let err = TrainingSetGenerator::new(config).err().unwrap();
    assert!(format!("{err:?}").contains("nope"));
}
