mod common;
mod utils;

use anyhow::Result;
use common::TestEnvironment;

#[test]
fn test_scenes_groups_sentences_under_the_cap() -> Result<()> {
    let env = TestEnvironment::new()?;
    let manifest = env.write_story(&[
        ("The rain began.", 6.0),
        ("She ran home.", 3.0),
        ("The door creaked.", 4.0),
        ("Nobody was there.", 2.5),
    ])?;

    let output = utils::run_storyreel_command(
        &env,
        &["scenes", "-m", manifest.to_str().unwrap(), "-o", "scenes.json"],
    )?;
    assert_eq!(output.exit_code, 0, "scenes failed: {}", output.stderr);

    let scenes = utils::read_json(&env.path().join("scenes.json"))?;
    let scenes = scenes.as_array().expect("scene document is an array");
    assert_eq!(scenes.len(), 2);

    assert_eq!(scenes[0]["scene_id"], 1);
    assert_eq!(scenes[0]["start_index"], 0);
    assert_eq!(scenes[0]["end_index"], 1);
    assert_eq!(scenes[0]["duration"], 9.0);
    assert_eq!(scenes[0]["image_file"], "scene_001.png");

    assert_eq!(scenes[1]["start_time"], 9.0);
    assert_eq!(scenes[1]["end_time"], 15.5);
    assert_eq!(scenes[1]["sentences"].as_array().map(Vec::len), Some(2));
    assert!(env.config_path().exists(), "default config was not created");

    Ok(())
}

#[test]
fn test_scenes_refuses_to_overwrite_without_force() -> Result<()> {
    let env = TestEnvironment::new()?;
    let manifest = env.write_story(&[("Once upon a time.", 3.0)])?;
    let manifest = manifest.to_str().unwrap();

    let first = utils::run_storyreel_command(&env, &["scenes", "-m", manifest])?;
    assert_eq!(first.exit_code, 0, "scenes failed: {}", first.stderr);

    let second = utils::run_storyreel_command(&env, &["scenes", "-m", manifest])?;
    assert_eq!(second.exit_code, 1);
    assert!(second.stderr.contains("--force"), "stderr: {}", second.stderr);

    let forced = utils::run_storyreel_command(&env, &["scenes", "-m", manifest, "--force"])?;
    assert_eq!(forced.exit_code, 0, "forced scenes failed: {}", forced.stderr);

    Ok(())
}

#[test]
fn test_captions_follow_sentence_timing() -> Result<()> {
    let env = TestEnvironment::new()?;
    let manifest = env.write_story(&[("Hello there.", 1.5), ("General Kenobi.", 2.0)])?;

    let output = utils::run_storyreel_command(
        &env,
        &["captions", "-m", manifest.to_str().unwrap()],
    )?;
    assert_eq!(output.exit_code, 0, "captions failed: {}", output.stderr);

    let srt = std::fs::read_to_string(env.path().join("story.srt"))?;
    assert!(srt.starts_with("1\n00:00:00,000 --> 00:00:01,500\nHello there.\n"));
    assert!(srt.contains("2\n00:00:01,500 --> 00:00:03,500\nGeneral Kenobi.\n"));

    Ok(())
}

#[test]
fn test_compose_dry_run_prints_batched_overlays() -> Result<()> {
    let env = TestEnvironment::new()?;
    let sentences: Vec<(String, f64)> = (0..7)
        .map(|i| (format!("Sentence number {i}."), 6.0))
        .collect();
    let pairs: Vec<(&str, f64)> = sentences.iter().map(|(s, d)| (s.as_str(), *d)).collect();
    let manifest = env.write_story(&pairs)?;

    let scenes = utils::run_storyreel_command(
        &env,
        &["scenes", "-m", manifest.to_str().unwrap()],
    )?;
    assert_eq!(scenes.exit_code, 0, "scenes failed: {}", scenes.stderr);
    utils::touch_images(&env.path().join("images"), 7)?;

    let output = utils::run_storyreel_command(
        &env,
        &[
            "compose",
            "scenes.json",
            "--base",
            "base.mp4",
            "--batch-size",
            "3",
            "--dry-run",
        ],
    )?;
    assert_eq!(output.exit_code, 0, "compose failed: {}", output.stderr);

    assert_eq!(output.stdout.matches("# batch ").count(), 3);
    assert!(output.stdout.contains("gte(t,0.000000)*lt(t,6.000000)"));
    assert!(output.stdout.contains("gte(t,36.000000)*lt(t,42.000000)"));
    assert!(output.stdout.contains("-map '0:a?'") || output.stdout.contains("-map 0:a?"));
    assert!(!env.path().join("base_composited.mp4").exists());

    Ok(())
}

#[test]
fn test_missing_manifest_exits_with_error() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = utils::run_storyreel_command(
        &env,
        &["scenes", "-m", "does-not-exist.json"],
    )?;
    assert_eq!(output.exit_code, 1);
    assert!(output.stderr.contains("does-not-exist.json"), "stderr: {}", output.stderr);

    Ok(())
}

#[test]
fn test_config_prints_path_and_defaults() -> Result<()> {
    let env = TestEnvironment::new()?;

    let output = utils::run_storyreel_command(&env, &["config"])?;
    assert_eq!(output.exit_code, 0, "config failed: {}", output.stderr);
    assert!(output.stdout.contains("story.toml"));
    assert!(output.stdout.contains("batch_size = 5"));

    let output = utils::run_storyreel_command(&env, &["config", "--path"])?;
    assert_eq!(output.stdout.trim(), env.config_path().display().to_string());

    Ok(())
}
