use std::{env, fs, path::Path, path::PathBuf, process::Command};

fn run_bin(args: &[&str]) -> bool {
    let bin = PathBuf::from(env!("CARGO_BIN_EXE_wealthdist"));

    let output = Command::new(bin)
        .args(args)
        .output()
        .expect("failed to execute command");

    if !output.status.success() {
        eprintln!(
            "binary failed with {args:?}\nstdout:\n{}\nstderr:\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    output.status.success()
}

fn check_run_file(file: &Path, n_ticks: usize, population: usize) {
    let contents = fs::read_to_string(file).expect("failed to read run file");
    let mut lines = contents.lines();
    assert_eq!(
        lines.next(),
        Some("tick,gini_index,poor_count,middle_count,rich_count,total_wealth,min_wealth,max_wealth")
    );

    let rows: Vec<&str> = lines.collect();
    assert_eq!(rows.len(), n_ticks);
    for (i_row, row) in rows.iter().enumerate() {
        let cols: Vec<&str> = row.split(',').collect();
        assert_eq!(cols.len(), 8, "row {i_row}: {row}");

        let tick: usize = cols[0].parse().unwrap();
        assert_eq!(tick, i_row + 1);

        let gini: f64 = cols[1].parse().unwrap();
        assert!((0.0..=1.0).contains(&gini));

        let counts: usize = cols[2..5].iter().map(|c| c.parse::<usize>().unwrap()).sum();
        assert_eq!(counts, population);

        let total: f64 = cols[5].parse().unwrap();
        let min: f64 = cols[6].parse().unwrap();
        let max: f64 = cols[7].parse().unwrap();
        assert!(0.0 <= min && min <= max && max <= total);
        assert!(total <= max * population as f64 + 1e-6);
    }
}

#[test]
fn batch_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("batch_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(&test_dir).expect("failed to create test directory");

    let out_dir = test_dir.join("out");
    let out_str = out_dir.to_str().expect("failed to convert out dir to string");

    let run_args = [
        "--out-dir", out_str, "run", "--scenario", "default", "--ticks", "500", "--runs", "2",
        "--seed", "7",
    ];
    assert!(run_bin(&run_args));

    for run_idx in 0..2 {
        check_run_file(&out_dir.join(format!("run-{run_idx:04}.csv")), 500, 250);
    }
    let summary = fs::read_to_string(out_dir.join("summary.toml")).unwrap();
    assert!(summary.contains("n_runs = 2"));
    assert!(summary.contains("[avg_lorenz]"));
    assert!(!out_dir.join("run-0002.csv").exists());

    let first = fs::read(out_dir.join("run-0001.csv")).unwrap();
    assert!(run_bin(&run_args));
    let second = fs::read(out_dir.join("run-0001.csv")).unwrap();
    assert_eq!(first, second);

    assert!(run_bin(&["--out-dir", out_str, "clean"]));
    assert!(!out_dir.join("run-0000.csv").exists());
    assert!(!out_dir.join("summary.toml").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn config_file_workflow() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("config_file_workflow");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(&test_dir).expect("failed to create test directory");

    let config_path = test_dir.join("config.toml");
    let config_contents = String::new()
        + "[world]\n"
        + "width = 21\n"
        + "height = 17\n"
        + "percent_best_land = 15.0\n"
        + "diffusion_rate = 0.2\n"
        + "\n"
        + "[agents]\n"
        + "population = 60\n"
        + "vision = { min = 1, max = 3 }\n"
        + "\n"
        + "[run]\n"
        + "scenario = \"uniform\"\n"
        + "ticks = 40\n"
        + "runs = 3\n"
        + "seed = 11\n";
    fs::write(&config_path, config_contents).expect("failed to write config file");

    let out_dir = test_dir.join("out");
    let out_str = out_dir.to_str().expect("failed to convert out dir to string");
    let config_str = config_path.to_str().expect("failed to convert config path to string");

    assert!(run_bin(&["--out-dir", out_str, "--config", config_str, "run"]));
    for run_idx in 0..3 {
        check_run_file(&out_dir.join(format!("run-{run_idx:04}.csv")), 40, 60);
    }

    assert!(run_bin(&[
        "--out-dir", out_str, "--config", config_str, "run", "--ticks", "10", "--runs", "1",
    ]));
    check_run_file(&out_dir.join("run-0000.csv"), 10, 60);
    assert!(!out_dir.join("run-0001.csv").exists());

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn failed_run_keeps_completed_runs() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("failed_run");

    fs::remove_dir_all(&test_dir).ok();
    let out_dir = test_dir.join("out");
    let out_str = out_dir.to_str().expect("failed to convert out dir to string");

    // A directory in place of the second run file makes that run fail.
    fs::create_dir_all(out_dir.join("run-0001.csv")).expect("failed to create blocker");

    assert!(!run_bin(&[
        "--out-dir", out_str, "run", "--ticks", "30", "--runs", "3", "--seed", "5",
    ]));
    check_run_file(&out_dir.join("run-0000.csv"), 30, 250);
    check_run_file(&out_dir.join("run-0002.csv"), 30, 250);

    let summary = fs::read_to_string(out_dir.join("summary.toml")).unwrap();
    assert!(summary.contains("n_runs = 2"));
    assert!(summary.contains("[avg_lorenz]"));

    fs::remove_dir_all(&test_dir).ok();
}

#[test]
fn invalid_input_fails_fast() {
    let test_dir = PathBuf::from(env!("CARGO_TARGET_TMPDIR")).join("invalid_input");

    fs::remove_dir_all(&test_dir).ok();
    fs::create_dir_all(&test_dir).expect("failed to create test directory");
    let out_str = test_dir.to_str().expect("failed to convert test dir to string");

    assert!(!run_bin(&["--out-dir", out_str, "run", "--scenario", "communism"]));
    assert!(!run_bin(&["--out-dir", out_str, "run", "--ticks", "0"]));

    let config_path = test_dir.join("config.toml");
    fs::write(&config_path, "[agents]\nmetabolism = { min = 9, max = 2 }\n").unwrap();
    let config_str = config_path.to_str().unwrap();
    assert!(!run_bin(&["--out-dir", out_str, "--config", config_str, "run"]));
    assert!(!test_dir.join("run-0000.csv").exists());

    fs::remove_dir_all(&test_dir).ok();
}
