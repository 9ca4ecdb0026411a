use std::process::Command;

fn shipcalc() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shipcalc"))
}

#[test]
fn test_cli_ballistics_table() {
    let output = shipcalc()
        .args(["ballistics", "--max-range", "16000", "--every", "50"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Range(m)"));
    assert!(stdout.contains("Pen (mm)"));
}

#[test]
fn test_cli_ballistics_json() {
    let output = shipcalc()
        .args(["ballistics", "--max-range", "10000", "-o", "json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("Output should be valid JSON");
    let entries = json["entries"].as_array().expect("entries array");
    assert!(!entries.is_empty());
    assert_eq!(entries[0]["range"].as_f64(), Some(0.0));
}

#[test]
fn test_cli_ballistics_csv() {
    let output = shipcalc()
        .args(["ballistics", "--kind", "he", "--flat-penetration", "34", "-o", "csv"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let mut lines = stdout.lines();
    assert_eq!(
        lines.next(),
        Some("range,penetration,impact_velocity,flight_time,impact_angle")
    );
    for line in lines {
        assert_eq!(line.split(',').nth(1), Some("34.0"));
    }
}

#[test]
fn test_cli_rejects_invalid_shell() {
    let output = shipcalc()
        .args(["ballistics", "--mass", "0"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("mass"));
}

#[test]
fn test_cli_dispersion_seeded_json() {
    let run = || {
        shipcalc()
            .args([
                "dispersion",
                "--aim-range",
                "12000",
                "--shots",
                "200",
                "--seed",
                "5",
                "--points",
                "-o",
                "json",
            ])
            .output()
            .expect("Failed to execute command")
    };
    let first = run();
    let second = run();

    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);

    let json: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    assert_eq!(json["ellipse"]["valid"], serde_json::Value::Bool(true));
    assert_eq!(json["hits"]["real"].as_array().map(|a| a.len()), Some(200));
}

#[test]
fn test_cli_dispersion_out_of_range() {
    let output = shipcalc()
        .args(["dispersion", "--max-range", "10000", "--aim-range", "40000"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("does not reach"));
}

#[test]
fn test_cli_acceleration() {
    let output = shipcalc()
        .args(["acceleration", "--class", "destroyer", "--max-speed", "38", "--throttle", "4,2,-1"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Max speed ahead"));
    assert!(stdout.contains("To speed (s)"));
}

#[test]
fn test_cli_acceleration_json_reports_bad_throttle() {
    let output = shipcalc()
        .args(["acceleration", "--throttle", "4,7", "-o", "json"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let transitions = json["transitions"].as_array().unwrap();
    assert_eq!(transitions.len(), 2);
    assert!(transitions[0]["curve"].is_object());
    assert!(transitions[1]["error"].is_string());
}

#[test]
fn test_cli_info() {
    let output = shipcalc()
        .arg("info")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("SHIPCALC ENGINE"));
}
