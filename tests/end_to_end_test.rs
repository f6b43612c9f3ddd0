//! End-to-end tests: raw frames in, derived samples and recordings out.

use pull_machine::acquisition::{parse_frame, FrameSource, LineReader};
use pull_machine::config::PullMachineConfig;
use pull_machine::data::MemoryRecordWriter;
use pull_machine::session::{LinkState, PullMachine};
use std::io::Cursor;
use std::time::{Duration, Instant};

fn zero_offset_config() -> PullMachineConfig {
    let mut config = PullMachineConfig::default();
    config.calibration.angle_offset_deg = 0.0;
    config
}

fn memory_machine(config: PullMachineConfig) -> PullMachine {
    PullMachine::with_writer(config, Box::new(MemoryRecordWriter::default()))
}

#[test]
fn test_two_frames_one_tick_apart() {
    let mut machine = memory_machine(zero_offset_config());
    let mut reader = LineReader::new(Cursor::new(b"0.0;5.0\r\n10.0;5.0\r\n".to_vec()), "cursor");

    let frame = reader.read_frame().unwrap().expect("first frame");
    machine.latest_reading().write(parse_frame(&frame).unwrap());
    let first = machine.tick_at(0.0);

    let frame = reader.read_frame().unwrap().expect("second frame");
    machine.latest_reading().write(parse_frame(&frame).unwrap());
    let second = machine.tick_at(0.05);

    assert_eq!(first.angle_deg, 0.0);
    assert_eq!(second.angle_deg, 10.0);

    // 0° is the fully retracted pose (|b - c|), so opening the arm lengthens the piston.
    assert!((first.piston_length_m - 0.078).abs() < 1e-9);
    assert!(second.piston_length_m > first.piston_length_m);

    let dl = second.piston_length_m - first.piston_length_m;
    assert_eq!(second.piston_velocity_mps.signum(), dl.signum());
    assert!((second.piston_velocity_mps - dl / 0.05).abs() < 1e-9);
    assert_eq!(second.power_w.signum(), second.piston_velocity_mps.signum());
    assert!((second.force_n - 527.5).abs() < 1e-9);
}

#[test]
fn test_worker_feeds_the_sampler() {
    let mut machine = memory_machine(zero_offset_config());
    let source = LineReader::new(
        Cursor::new(b"0.0;5.0\r\ngarbage\r\n10.0;5.0\r\n".to_vec()),
        "cursor",
    );
    machine
        .connect_source(Box::new(source))
        .expect("worker should start");
    assert_eq!(machine.link_state(), &LinkState::Live);

    let deadline = Instant::now() + Duration::from_secs(5);
    while machine.latest_reading().sequence() < 2 {
        assert!(Instant::now() < deadline, "frames not published in time");
        std::thread::sleep(Duration::from_millis(1));
    }

    let sample = machine.tick_at(0.0);
    assert_eq!(sample.angle_deg, 10.0);
    assert_eq!(sample.pressure_bar, 5.0);

    let stats = machine.worker_stats().expect("worker attached");
    assert_eq!(stats.frames_accepted, 2);
    assert_eq!(stats.frames_rejected, 1);

    machine.shutdown().unwrap();
    assert!(!machine.is_live());
}

#[test]
fn test_default_reading_before_first_frame() {
    let mut machine = memory_machine(PullMachineConfig::default());
    let sample = machine.tick_at(0.0);
    assert_eq!(sample.angle_deg, 49.78);
    assert_eq!(sample.pressure_bar, 0.0);
    assert_eq!(sample.power_w, 0.0);
}

#[test]
fn test_history_feeds_the_power_chart() {
    let mut machine = memory_machine(zero_offset_config());
    for i in 0..=20 {
        machine
            .latest_reading()
            .write(parse_frame(format!("{};4.0\r\n", i * 2).as_bytes()).unwrap());
        machine.tick_at(f64::from(i) * 0.05);
    }

    let series = machine.power_series();
    assert_eq!(series.len(), 21);
    assert!(series.windows(2).all(|w| w[0].0 < w[1].0));

    let chart = machine.power_chart();
    assert_eq!(chart.points.first().map(|p| p.0), Some(0.0));
    assert_eq!(chart.x_max, 30.0);
    let (lo, hi) = chart.y_range.expect("non-empty chart");
    assert!(chart.points.iter().all(|&(_, p)| lo <= p && p <= hi));

    let display = machine.display();
    assert_eq!(display.angle_deg, 40.0);
    assert_eq!(display.pressure_bar, 4.0);
}
