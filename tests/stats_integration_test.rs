use auto_curriculum::app::pipelines::{StatsOptions, StatsPipeline};
use auto_curriculum::config::stats_config::StatsConfig;
use auto_curriculum::core::stats::CLEAN_SUFFIX;
use auto_curriculum::{Engine, LocalStorage};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const ENVS: [&str; 2] = ["MiniGrid-Unlock-v0", "MiniGrid-UnlockPickup-v0"];

fn write_log(dir: &Path, rows: &[(u64, [&str; 2], [f64; 2])]) {
    fs::create_dir_all(dir).unwrap();
    let mut content = String::from("update,frames,duration");
    for env in ENVS {
        content.push_str(&format!(",return/{}", env));
    }
    for env in ENVS {
        content.push_str(&format!(",proba/{}", env));
    }
    content.push('\n');
    for (i, (frames, returns, probas)) in rows.iter().enumerate() {
        content.push_str(&format!(
            "{},{},0.5,{},{},{},{}\n",
            i + 1,
            frames,
            returns[0],
            returns[1],
            probas[0],
            probas[1]
        ));
    }
    fs::write(dir.join("log.csv"), content).unwrap();
}

fn catalogue(max_frame: &str) -> StatsConfig {
    StatsConfig::from_toml_str(&format!(
        r#"
[[stats]]
name = "Unlock-Return"
kind = "return-bands"
max_frame = {max_frame}
runs = [
    {{ label = "Base", folder = "exp/base" }},
    {{ label = "MR", folder = "exp/mr" }},
]

[[stats]]
name = "Unlock-ReturnProba"
kind = "return-proba"
runs = [{{ label = "MR", folder = "exp/mr" }}]
"#
    ))
    .unwrap()
}

fn setup_models(models: &Path) {
    // 兩個種子，其中一個比較短
    write_log(
        &models.join("exp/base/seed1"),
        &[
            (100, ["0.25", ""], [0.75, 0.25]),
            (200, ["0.5", "0"], [0.75, 0.25]),
            (300, ["0.5", ""], [0.5, 0.5]),
            (400, ["1", "0.25"], [0.5, 0.5]),
        ],
    );
    write_log(
        &models.join("exp/base/seed2"),
        &[
            (100, ["0.75", ""], [0.75, 0.25]),
            (200, ["0.75", ""], [0.75, 0.25]),
            (300, ["0.75", "0.5"], [0.5, 0.5]),
        ],
    );
    write_log(
        &models.join("exp/mr/seed1"),
        &[
            (100, ["1", "0.5"], [0.5, 0.5]),
            (200, ["1", "1"], [0.25, 0.75]),
            (300, ["1", "1"], [0.75, 0.25]),
        ],
    );
}

#[tokio::test]
async fn test_return_bands_end_to_end() {
    let root = TempDir::new().unwrap();
    let models = root.path().join("models");
    let stats_dir = root.path().join("stats");
    setup_models(&models);

    let catalogue = catalogue("250");
    let stat = catalogue.get("Unlock-Return").unwrap().clone();
    let pipeline = StatsPipeline::new(
        LocalStorage::new(&stats_dir),
        &models,
        stat,
        StatsOptions {
            window: 1,
            return_to_reach: 0.9,
        },
    );

    let engine = Engine::new_with_monitoring(pipeline, false);
    let result = engine.run().await;
    assert!(result.is_ok(), "{:?}", result);

    // 清理後的副本留在原始日誌旁邊
    let clean = models.join(format!("exp/base/seed1/log.csv{}", CLEAN_SUFFIX));
    assert!(clean.exists());
    let clean_content = fs::read_to_string(clean).unwrap();
    assert!(clean_content.lines().nth(1).unwrap().contains(",0.25,0,"));

    // 第一個 frames > 250 的列是 index 2，所以只剩兩列
    let bands = fs::read_to_string(stats_dir.join("Unlock-Return.csv")).unwrap();
    let lines: Vec<&str> = bands.lines().collect();
    assert_eq!(lines[0], "algorithm,env,frames,p25,p50,p75");
    assert_eq!(lines.len(), 1 + 2 * 2 * 2);
    assert_eq!(lines[1], "Base,Unlock,100,0.375,0.5,0.625");
    assert!(lines.iter().any(|l| l.starts_with("MR,UnlockPickup,200,1,1,1")));

    let reach = fs::read_to_string(stats_dir.join("Unlock-Return-reach.csv")).unwrap();
    assert!(reach.contains("Base,Unlock,0.9,\n"));
    assert!(reach.contains("MR,Unlock,0.9,100"));
    assert!(reach.contains("MR,UnlockPickup,0.9,200"));
}

#[tokio::test]
async fn test_return_proba_end_to_end() {
    let root = TempDir::new().unwrap();
    let models = root.path().join("models");
    let stats_dir = root.path().join("stats");
    setup_models(&models);

    let stat = catalogue("250").get("Unlock-ReturnProba").unwrap().clone();
    let pipeline = StatsPipeline::new(
        LocalStorage::new(&stats_dir),
        &models,
        stat,
        StatsOptions {
            window: 2,
            return_to_reach: 0.8,
        },
    );

    let written = Engine::new(pipeline).run().await.unwrap();
    assert_eq!(written, "Unlock-ReturnProba.csv");

    let csv = fs::read_to_string(stats_dir.join("Unlock-ReturnProba.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "env,frames,return,proba");
    assert_eq!(lines.len(), 1 + 3 * 2);
    assert_eq!(lines[4], "UnlockPickup,100,0.5,0.5");
    assert_eq!(lines[5], "UnlockPickup,200,0.75,0.625");
}

#[tokio::test]
async fn test_missing_logs_is_an_error() {
    let root = TempDir::new().unwrap();
    let models = root.path().join("models");
    fs::create_dir_all(models.join("exp/base")).unwrap();
    fs::create_dir_all(models.join("exp/mr")).unwrap();

    let stat = catalogue("250").get("Unlock-Return").unwrap().clone();
    let pipeline = StatsPipeline::new(
        LocalStorage::new(root.path().join("stats")),
        &models,
        stat,
        StatsOptions::default(),
    );

    assert!(Engine::new(pipeline).run().await.is_err());
}

#[test]
fn test_unknown_stat_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_compute_stats"))
        .args(["--stat", "NoSuchStat"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("NoSuchStat"), "stderr: {}", stderr);
    assert!(stderr.contains("stat"));
    // 沒有寫出任何統計
    assert!(!dir.path().join("storage/stats").exists());
}
