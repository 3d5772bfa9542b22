mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{Harness, HEIGHT, WIDTH};
use watchdog_cli::camera::FrameOutcome;
use watchdog_common::camera::{CaptureMode, MotionConfig};
use watchdog_shared::{InspectStatus, MotionFlags, StreamFlags};

const MOTION_DETECTION: u8 = 1;
const RTMP_VIDEO: u8 = 2;
const WARNING_SOUND: u8 = 3;
const INSPECT_STATUS: u8 = 4;

async fn status(harness: &Harness) -> InspectStatus {
    let response = harness.send(&[INSPECT_STATUS]).await;
    InspectStatus::from_bytes(&response).expect("status response")
}

#[tokio::test]
async fn empty_message_gets_single_zero_byte() {
    let harness = Harness::new();
    assert_eq!(harness.send(&[]).await, vec![0]);
}

#[tokio::test]
async fn unknown_command_is_echoed() {
    let harness = Harness::new();
    assert_eq!(harness.send(&[0x42, 7, 9]).await, vec![0x42, 7, 9]);
    assert_eq!(harness.send(&[0]).await, vec![0]);
    assert_eq!(status(&harness).await, InspectStatus::default());
}

#[tokio::test]
async fn commands_are_echoed() {
    let harness = Harness::new();
    for message in [
        vec![MOTION_DETECTION, 0b110],
        vec![MOTION_DETECTION],
        vec![RTMP_VIDEO, 0],
        vec![RTMP_VIDEO],
        vec![WARNING_SOUND, 1, 0xff],
        vec![WARNING_SOUND],
    ] {
        assert_eq!(harness.send(&message).await, message);
    }
}

#[tokio::test]
async fn initial_status_is_all_clear() {
    let harness = Harness::new();
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0, 0]);
}

#[tokio::test]
async fn camera_open_is_visible_in_status() {
    let harness = Harness::new();
    harness
        .send(&[MOTION_DETECTION, MotionFlags::CAMERA.bits()])
        .await;

    let status = status(&harness).await;
    assert!(status.motion.contains(MotionFlags::CAMERA));
    assert!(!status.motion.contains(MotionFlags::FLASH_LIGHT));

    let opens = harness.camera.lock().unwrap().opens.clone();
    assert_eq!(opens, vec![("0".to_string(), CaptureMode::Record, false)]);
}

#[tokio::test]
async fn repeated_camera_open_opens_once() {
    let harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    assert_eq!(harness.opens(), 1);
    assert_eq!(harness.camera.lock().unwrap().closes, 0);
}

#[tokio::test]
async fn flash_change_reopens_camera() {
    let harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b011]).await;
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0b011, 0]);

    harness.send(&[MOTION_DETECTION, 0b010]).await;
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0b010, 0]);
    assert_eq!(harness.opens(), 2);
}

#[tokio::test]
async fn camera_close_clears_flash() {
    let harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b011]).await;
    harness.send(&[MOTION_DETECTION, 0b000]).await;

    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0, 0]);
    assert_eq!(harness.camera.lock().unwrap().closes, 1);
    assert!(!harness.device.state().flash_on);
}

#[tokio::test]
async fn camera_failure_still_echoes_and_reports_closed() {
    let harness = Harness::new();
    harness.camera.lock().unwrap().refuse_open = true;

    let message = [MOTION_DETECTION, 0b110];
    assert_eq!(harness.send(&message).await, message.to_vec());

    let status = status(&harness).await;
    assert!(!status.motion.contains(MotionFlags::CAMERA));
    // the auto warning part of the command still applies
    assert!(status.motion.contains(MotionFlags::AUTO_WARNING));
}

#[tokio::test]
async fn first_frame_after_reopen_never_moves() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    assert_eq!(
        harness.feed(0),
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(
        harness.feed(255),
        FrameOutcome::Processed {
            moved: true
        }
    );

    harness.send(&[MOTION_DETECTION, 0b000]).await;
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    // the reference from before the close is gone
    assert_eq!(
        harness.feed(0),
        FrameOutcome::Processed {
            moved: false
        }
    );
}

#[tokio::test(start_paused = true)]
async fn status_waits_for_the_settle_delay_without_stalling_frames() {
    let mut config = common::test_config();
    config.settle_delay_ms = 500;
    let mut harness = Harness::with_config(config);
    harness.send(&[MOTION_DETECTION, 0b110]).await;

    let started = tokio::time::Instant::now();
    let handler = harness.handler.clone();
    let inspect = tokio::spawn(async move { handler.handle(&[INSPECT_STATUS]).await });
    for _ in 0..4 {
        tokio::task::yield_now().await;
    }

    tokio::time::advance(Duration::from_millis(499)).await;
    assert!(!inspect.is_finished());

    // frames keep flowing while the status request waits
    assert_eq!(
        harness.feed(0),
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(
        harness.feed(255),
        FrameOutcome::Processed {
            moved: true
        }
    );

    tokio::time::advance(Duration::from_millis(1)).await;
    let response = inspect.await.unwrap();
    assert!(started.elapsed() >= Duration::from_millis(500));
    assert_eq!(response, vec![INSPECT_STATUS, 0b110, 0b10]);
}

#[tokio::test]
async fn frames_inside_the_frame_interval_are_throttled() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;

    let now = std::time::Instant::now();
    let first_frame = harness.frame(WIDTH, HEIGHT, 0);
    let second_frame = harness.frame(WIDTH, HEIGHT, 255);
    let first = harness.pipeline.on_frame(first_frame, now);
    let second = harness
        .pipeline
        .on_frame(second_frame, now + std::time::Duration::from_millis(10));
    assert_eq!(
        first,
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(second, FrameOutcome::Throttled);
}

#[tokio::test]
async fn alarm_follows_motion_only_with_auto_warning() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.feed(0);
    harness.feed(255);
    assert!(!harness.siren_playing());

    harness.send(&[MOTION_DETECTION, 0b110]).await;
    harness.feed(0);
    assert!(harness.siren_playing());
    harness.feed(0);
    assert!(!harness.siren_playing());

    harness.feed(255);
    assert!(harness.siren_playing());
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    assert!(!harness.siren_playing());
}

#[tokio::test]
async fn camera_close_stops_motion_alarm() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b110]).await;
    harness.feed(0);
    harness.feed(255);
    assert!(harness.siren_playing());

    harness.send(&[MOTION_DETECTION, 0b100]).await;
    assert!(!harness.siren_playing());
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0b100, 0]);
}

#[tokio::test]
async fn warning_sound_overrides() {
    let harness = Harness::new();
    harness.send(&[WARNING_SOUND, 1]).await;
    {
        let siren = harness.siren.lock().unwrap();
        assert!(siren.playing);
        assert!(siren.loud);
    }
    assert!(
        status(&harness)
            .await
            .stream
            .contains(StreamFlags::WARNING_SOUND)
    );

    harness.send(&[WARNING_SOUND, 0]).await;
    assert!(!harness.siren_playing());
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0, 0]);
}

#[tokio::test]
async fn streaming_start_and_stop() {
    let harness = Harness::new();

    // stopping while stopped is a no-op
    assert_eq!(harness.send(&[RTMP_VIDEO, 0]).await, vec![RTMP_VIDEO, 0]);
    assert_eq!(harness.sink.starts.load(Ordering::SeqCst), 0);

    harness.send(&[RTMP_VIDEO, 1]).await;
    harness.send(&[RTMP_VIDEO, 1]).await;
    assert_eq!(harness.sink.starts.load(Ordering::SeqCst), 1);
    assert!(
        status(&harness)
            .await
            .stream
            .contains(StreamFlags::RTMP_VIDEO)
    );

    let settings = harness
        .sink
        .settings
        .lock()
        .unwrap()
        .clone()
        .unwrap();
    assert_eq!((settings.width, settings.height), (WIDTH / 2, HEIGHT / 2));
    assert_eq!(settings.audio_sample_rate, 44100);
    harness.wait_for_audio_blocks(2).await;

    harness.send(&[RTMP_VIDEO]).await;
    assert!(!harness.sink.connected.load(Ordering::SeqCst));
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0, 0]);
}

#[tokio::test]
async fn streaming_connect_failure_is_not_fatal() {
    let harness = Harness::new();
    harness
        .sink
        .refuse_connect
        .store(true, Ordering::SeqCst);

    assert_eq!(harness.send(&[RTMP_VIDEO, 1]).await, vec![RTMP_VIDEO, 1]);
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0, 0]);

    // the next explicit command retries
    harness
        .sink
        .refuse_connect
        .store(false, Ordering::SeqCst);
    harness.send(&[RTMP_VIDEO, 1]).await;
    assert!(harness.device.state().streaming);
}

#[tokio::test]
async fn push_while_idle_is_silent() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.feed(0);
    harness.feed(255);

    harness
        .device
        .pusher()
        .push(common::uniform(WIDTH, HEIGHT, 1, 99));
    assert_eq!(harness.sink_frames(), 0);
    assert_eq!(harness.device.pusher().stats().pushed, 0);
}

#[tokio::test]
async fn frames_reach_the_sink_scaled_while_streaming() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.send(&[RTMP_VIDEO, 1]).await;

    harness.feed(0);
    harness.wait_for_sink_frames(1).await;
    let (width, height, sequence) = harness.sink.frames.lock().unwrap()[0];
    assert_eq!((width, height), (WIDTH / 2, HEIGHT / 2));
    assert_eq!(sequence, 1);
}

#[tokio::test]
async fn sink_write_failure_degrades_to_dropping() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.send(&[RTMP_VIDEO, 1]).await;
    harness
        .sink
        .fail_writes
        .store(true, Ordering::SeqCst);

    // the frame pipeline carries on regardless
    for value in [0, 255, 0, 255] {
        assert!(matches!(harness.feed(value), FrameOutcome::Processed { .. }));
    }
    assert_eq!(harness.sink_frames(), 0);

    harness
        .sink
        .fail_writes
        .store(false, Ordering::SeqCst);
    harness.send(&[RTMP_VIDEO, 0]).await;
    harness.send(&[RTMP_VIDEO, 1]).await;
    harness.feed(0);
    harness.wait_for_sink_frames(1).await;
}

#[tokio::test]
async fn config_change_rebaselines_detector() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.feed(0);

    let config = MotionConfig {
        diff_threshold: 10,
        ..harness.device.motion_config()
    };
    harness
        .device
        .change_config(config)
        .unwrap();
    assert_eq!(harness.camera.lock().unwrap().config, Some(config));

    assert_eq!(
        harness.feed(255),
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(
        harness.feed(100),
        FrameOutcome::Processed {
            moved: true
        }
    );
}

#[tokio::test]
async fn frames_queued_before_a_config_change_are_dropped() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b110]).await;
    harness.feed(0);
    let queued = [harness.frame(WIDTH, HEIGHT, 255), harness.frame(WIDTH, HEIGHT, 0)];

    let config = MotionConfig {
        width: WIDTH * 2,
        height: HEIGHT * 2,
        ..harness.device.motion_config()
    };
    harness
        .device
        .change_config(config)
        .unwrap();

    for frame in queued {
        assert_eq!(harness.feed_frame(frame), FrameOutcome::Stale);
    }
    // detection carries on at the new size
    assert_eq!(
        harness.feed_sized(WIDTH * 2, HEIGHT * 2, 0),
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(
        harness.feed_sized(WIDTH * 2, HEIGHT * 2, 255),
        FrameOutcome::Processed {
            moved: true
        }
    );
    assert!(harness.siren_playing());
}

#[tokio::test]
async fn frames_from_before_a_reopen_never_become_the_reference() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b010]).await;
    harness.feed(0);
    let before_close = harness.frame(WIDTH, HEIGHT, 255);

    harness.send(&[MOTION_DETECTION, 0b000]).await;
    harness.send(&[MOTION_DETECTION, 0b010]).await;

    assert_eq!(harness.feed_frame(before_close), FrameOutcome::Stale);
    assert_eq!(
        harness.feed(0),
        FrameOutcome::Processed {
            moved: false
        }
    );
    assert_eq!(
        harness.feed(0),
        FrameOutcome::Processed {
            moved: false
        }
    );
}

#[tokio::test]
async fn invalid_config_change_is_rejected() {
    let harness = Harness::new();
    let config = MotionConfig {
        scale: 3,
        ..harness.device.motion_config()
    };
    assert!(harness.device.change_config(config).is_err());
    assert_eq!(harness.device.motion_config().scale, 4);
}

#[tokio::test]
async fn geometry_mismatch_halts_detection_until_reconfigured() {
    let mut harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b110]).await;

    assert_eq!(harness.feed_sized(WIDTH * 2, HEIGHT * 2, 0), FrameOutcome::Halted);
    assert_eq!(harness.feed(0), FrameOutcome::Halted);

    let config = MotionConfig {
        width: WIDTH * 2,
        height: HEIGHT * 2,
        ..harness.device.motion_config()
    };
    harness
        .device
        .change_config(config)
        .unwrap();
    assert_eq!(
        harness.feed_sized(WIDTH * 2, HEIGHT * 2, 0),
        FrameOutcome::Processed {
            moved: false
        }
    );
}

#[tokio::test]
async fn stale_motion_signal_is_ignored() {
    let harness = Harness::new();
    harness.send(&[MOTION_DETECTION, 0b110]).await;
    let epoch = harness.device.detector_epoch();

    harness.send(&[MOTION_DETECTION, 0b111]).await;
    harness.device.on_motion_signal(epoch, true);
    assert!(!harness.siren_playing());

    harness
        .device
        .on_motion_signal(harness.device.detector_epoch(), true);
    assert!(harness.siren_playing());
}

#[tokio::test]
async fn end_to_end() {
    let mut harness = Harness::new();

    // camera and auto warning on, flash off
    assert_eq!(harness.send(&[MOTION_DETECTION, 0b110]).await, vec![MOTION_DETECTION, 0b110]);
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0b110, 0]);

    // two frames that differ by more than the threshold
    harness.feed(0);
    harness.feed(255);
    assert!(harness.siren_playing());

    assert_eq!(harness.send(&[RTMP_VIDEO, 1]).await, vec![RTMP_VIDEO, 1]);
    harness.feed(0);
    harness.wait_for_sink_frames(1).await;
    assert!(harness.siren_playing());

    // camera and auto warning on, streaming and alarm on
    assert_eq!(harness.send(&[INSPECT_STATUS]).await, vec![4, 0b110, 0b11]);

    harness.device.shutdown();
    assert!(harness.siren.lock().unwrap().closed);
    assert!(!harness.sink.connected.load(Ordering::SeqCst));
    assert!(!harness.device.state().camera_open);
}
