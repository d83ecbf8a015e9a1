//! End-to-end conversions through the public `Converter` facade.

mod common;

use std::sync::Arc;

use common::{gradient, quiet_config, recorder, LOGO_SVG};
use webpforge::{
    BackendKind, CancellationToken, Collaborators, ConversionEvent, ConversionState, Converter,
    EncodeContext, EncodeOptions, Error, ImageBuffer, ImageSource, Preferences,
};
use wf_codec::lossless::is_webp;
use wf_codec::{LibWebpCodec, SoftwareGpu, UnavailableCodec, UnavailableGpu};

#[tokio::test]
async fn converts_with_defaults() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let report = converter.convert(gradient(128, 96)).await.unwrap();

    assert!(is_webp(&report.result.bytes));
    assert_eq!(report.result.original_size, 128 * 96 * 4);
    assert!(report.attempts.last().unwrap().outcome.is_success());
    assert_eq!(report.attempts.last().unwrap().backend, report.method);
}

#[tokio::test]
async fn nothing_optional_uses_baseline() {
    let mut config = quiet_config();
    config.probe.disable_workers = true;
    let converter = Converter::setup(
        config,
        Collaborators::new(Arc::new(UnavailableGpu), Arc::new(UnavailableCodec)),
    )
    .await;

    assert!(!converter.capabilities().gpu_available);
    assert!(!converter.capabilities().native_codec_available);
    let report = converter.convert(gradient(32, 32)).await.unwrap();
    assert_eq!(report.method, BackendKind::Baseline);
    assert_eq!(report.attempts.len(), 1);
    assert!(!report.degraded());
}

#[tokio::test]
async fn native_codec_is_preferred_when_present() {
    let converter = Converter::setup(
        quiet_config(),
        Collaborators::new(Arc::new(UnavailableGpu), Arc::new(LibWebpCodec::new())),
    )
    .await;
    let report = converter.convert(gradient(64, 64)).await.unwrap();
    assert_eq!(report.method, BackendKind::WasmOptimized);
    assert!(report.optimizations_applied.contains("native-codec"));
}

#[tokio::test]
async fn lossless_preference_selects_lossless_codec() {
    let mut config = quiet_config();
    config.preferences.wasm_lossless = true;
    let converter = Converter::setup(config, Collaborators::default()).await;
    let report = converter.convert(gradient(64, 64)).await.unwrap();
    assert_eq!(report.method, BackendKind::WasmLossless);
    assert_eq!(report.result.actual_quality, 1.0);
}

#[tokio::test]
async fn software_gpu_device_is_carried_into_backends() {
    let mut config = quiet_config();
    config.preferences.enable_wasm = false;
    let converter = Converter::setup(config, Collaborators::software()).await;

    assert!(converter.capabilities().gpu_available);
    assert!(converter.probe_report().device.is_some());
    // Unknown performance class keeps the high-class GPU rules out.
    let plan = converter
        .orchestrator()
        .plan(64 * 64 * 4, &EncodeOptions::default(), &converter.config().preferences);
    assert!(!plan.kinds().contains(&BackendKind::GpuStandard));
}

#[tokio::test]
async fn svg_source_is_rasterised() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let report = converter
        .convert_source(
            ImageSource::Svg(LOGO_SVG.to_string()),
            2.0,
            &EncodeOptions::default(),
            &Preferences::default(),
            &EncodeContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.result.original_size, 240 * 160 * 4);
    assert!(is_webp(&report.result.bytes));
}

#[tokio::test]
async fn svg_source_respects_bounds() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let opts = EncodeOptions {
        max_width: 60,
        max_height: 60,
        ..EncodeOptions::default()
    };
    let report = converter
        .convert_source(
            ImageSource::Svg(LOGO_SVG.to_string()),
            1.0,
            &opts,
            &Preferences::default(),
            &EncodeContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.result.original_size, 60 * 40 * 4);
}

#[tokio::test]
async fn broken_svg_is_invalid_input() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let err = converter
        .convert_source(
            ImageSource::Svg("<svg".to_string()),
            1.0,
            &EncodeOptions::default(),
            &Preferences::default(),
            &EncodeContext::new(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err:?}");
}

#[tokio::test]
async fn encoded_source_round_trips() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let first = converter.convert(gradient(40, 30)).await.unwrap();

    let report = converter
        .convert_source(
            ImageSource::Encoded(first.result.bytes),
            1.0,
            &EncodeOptions::default(),
            &Preferences::default(),
            &EncodeContext::new(),
        )
        .await
        .unwrap();
    assert_eq!(report.result.original_size, 40 * 30 * 4);
}

#[tokio::test]
async fn malformed_options_fail_fast() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let opts = EncodeOptions {
        time_budget_ms: 0,
        ..EncodeOptions::default()
    };
    let err = converter
        .convert_with(gradient(8, 8), &opts, &Preferences::default(), &EncodeContext::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn malformed_buffer_is_rejected() {
    assert!(matches!(
        ImageBuffer::new(4, 4, vec![0; 10]).unwrap_err(),
        Error::InvalidInput(_)
    ));
}

#[tokio::test]
async fn cancelled_token_short_circuits() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let token = CancellationToken::new();
    token.cancel();
    let ctx = EncodeContext::new().with_cancellation(token);
    let err = converter
        .convert_with(gradient(8, 8), &EncodeOptions::default(), &Preferences::default(), &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Cancelled));
}

#[tokio::test]
async fn events_bracket_the_conversion() {
    let converter = Converter::setup(quiet_config(), Collaborators::default()).await;
    let (sender, events) = recorder();
    let ctx = EncodeContext::new().with_events(sender);

    let report = converter
        .convert_with(gradient(16, 16), &EncodeOptions::default(), &Preferences::default(), &ctx)
        .await
        .unwrap();

    let events = events.lock();
    assert_eq!(
        events.first(),
        Some(&ConversionEvent::StateChanged {
            state: ConversionState::Selecting
        })
    );
    assert_eq!(
        events.last(),
        Some(&ConversionEvent::StateChanged {
            state: ConversionState::Succeeded
        })
    );
    assert!(events.iter().any(|e| matches!(
        e,
        ConversionEvent::Completed { backend, compressed_size, .. }
            if *backend == report.method && *compressed_size == report.result.compressed_size
    )));
}

#[tokio::test]
async fn concurrent_conversions_share_one_converter() {
    let converter = Arc::new(Converter::setup(quiet_config(), Collaborators::default()).await);
    let mut handles = Vec::new();
    for i in 0..4u32 {
        let converter = Arc::clone(&converter);
        handles.push(tokio::spawn(async move {
            converter.convert(gradient(16 + i * 8, 16)).await
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }
}

#[tokio::test]
async fn gpu_device_lost_after_probe_falls_back() {
    // Explicit capabilities pin the plan to GpuStandard, CpuStandard, Baseline.
    let gpu = Arc::new(SoftwareGpu::default());
    let collaborators = Collaborators::new(gpu.clone(), Arc::new(LibWebpCodec::new()));
    let converter = Converter::setup(quiet_config(), collaborators.clone()).await;
    let device = converter.probe_report().device.clone().unwrap();
    gpu.mark_lost(&device);

    let caps = webpforge::Capabilities {
        gpu_available: true,
        worker_available: true,
        progressive_supported: false,
        native_codec_available: false,
        performance_class: webpforge::PerformanceClass::High,
    };
    let registry =
        webpforge::BackendRegistry::standard(collaborators, Some(device), converter.config());
    let orchestrator = webpforge::ConversionOrchestrator::new(caps, registry);

    let report = orchestrator
        .convert(gradient(64, 64), &EncodeOptions::default(), &Preferences::default())
        .await
        .unwrap();
    assert_eq!(report.attempts[0].backend, BackendKind::GpuStandard);
    assert!(!report.attempts[0].outcome.is_success());
    assert_eq!(report.method, BackendKind::CpuStandard);
}
