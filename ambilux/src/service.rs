//! Host service core logic.
//!
//! Wires configuration into a transport, a frame pipeline and a frame
//! source, then drives the pipeline on a blocking worker until the source
//! ends, a fatal error occurs, or the service is stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{error, info};

use ambilux_core::error::{AmbiluxError, Result};
use ambilux_core::frame::FrameSource;
use ambilux_core::pipeline::{FramePipeline, RunOutcome, ZoneObserver};
use ambilux_core::transport::{self, DeviceTransport};

use crate::config::AmbiluxConfig;
use crate::preview;

// ── AmbiluxService ───────────────────────────────────────────────

/// The top-level host service.
pub struct AmbiluxService {
    config: AmbiluxConfig,
    running: Arc<AtomicBool>,
    preview: bool,
}

impl AmbiluxService {
    pub fn new(config: AmbiluxConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            preview: false,
        }
    }

    /// Render the outgoing colors on stderr while running.
    pub fn with_preview(mut self, enabled: bool) -> Self {
        self.preview = enabled;
        self
    }

    /// Obtain a handle that can be used to stop the service from
    /// another task or a signal handler.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn config(&self) -> &AmbiluxConfig {
        &self.config
    }

    /// Run with the source described by the configuration.
    pub async fn run(&self) -> Result<RunOutcome> {
        let source = crate::source::from_config(&self.config)?;
        let transport = transport::open(self.config.endpoint());
        self.run_with(source, transport).await
    }

    /// Run with an explicit source and transport.
    ///
    /// 1. Builds the pipeline from the configuration.
    /// 2. Performs the handshake and streams frames on a blocking worker.
    /// 3. Returns when the source ends, a frame fails, or `running`
    ///    becomes `false`. The transport is closed in every case.
    pub async fn run_with(
        &self,
        mut source: Box<dyn FrameSource + Send>,
        transport: Arc<dyn DeviceTransport>,
    ) -> Result<RunOutcome> {
        let settings = self.config.to_pipeline_settings()?;
        info!(
            "{} zones per frame ({} bytes) over {}",
            settings.layout.zone_count(),
            settings.layout.packet_len(),
            transport.describe()
        );

        let mut pipeline = FramePipeline::new(settings, transport);
        if self.preview {
            let observer: ZoneObserver = preview::stderr_observer();
            pipeline = pipeline.with_observer(observer);
        }

        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let worker =
            tokio::task::spawn_blocking(move || pipeline.run(&mut source, &running));

        let result = match worker.await {
            Ok(result) => result,
            Err(e) => Err(AmbiluxError::Io(std::io::Error::other(e))),
        };
        self.running.store(false, Ordering::SeqCst);

        match &result {
            Ok(outcome) => info!(
                "stopped ({:?}): {} frames, {} bytes, {} capture gaps",
                outcome.reason, outcome.stats.frames_sent, outcome.stats.bytes_sent, outcome.stats.gaps
            ),
            Err(e) => error!("service failed: {e}"),
        }
        result
    }

    /// Signal the service to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the service is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;
    use std::time::Duration;

    use ambilux_core::pipeline::StopReason;
    use ambilux_core::transport::{NetworkEndpoint, NetworkTransport};

    use super::*;
    use crate::config::TransportKind;
    use crate::source::PatternSource;

    fn device() -> UdpSocket {
        let sock = UdpSocket::bind("127.0.0.1:0").unwrap();
        sock.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        sock
    }

    fn config_for(device: &UdpSocket) -> AmbiluxConfig {
        let addr = device.local_addr().unwrap();
        let mut cfg = AmbiluxConfig::default();
        cfg.capture.width = 64;
        cfg.capture.height = 36;
        cfg.device.handshake_delay_ms = 0;
        cfg.transport.kind = TransportKind::Network;
        cfg.transport.network.host = addr.ip().to_string();
        cfg.transport.network.port = addr.port();
        cfg
    }

    #[tokio::test]
    async fn pattern_session_reaches_device() {
        let dev = device();
        let cfg = config_for(&dev);
        let source = Box::new(PatternSource::new(64, 36, 0).with_limit(3));
        let transport = transport::open(cfg.endpoint());

        let service = AmbiluxService::new(cfg);
        let outcome = service.run_with(source, transport).await.unwrap();
        assert_eq!(outcome.reason, StopReason::EndOfStream);
        assert_eq!(outcome.stats.frames_sent, 3);
        assert!(!service.is_running());

        // 64x36 at depth 10: 4 + 7 + 4 zones.
        let mut buf = [0u8; 256];
        let (n, _) = dev.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0xFF, 0xAA, 150, 0]);
        for _ in 0..3 {
            let (n, _) = dev.recv_from(&mut buf).unwrap();
            assert_eq!(n, 15 * 3);
        }
    }

    #[tokio::test]
    async fn stop_handle_ends_an_endless_source() {
        let dev = device();
        let cfg = config_for(&dev);
        let service = Arc::new(AmbiluxService::new(cfg.clone()));
        let stop = service.stop_handle();

        let transport: Arc<dyn DeviceTransport> = Arc::new(NetworkTransport::new(NetworkEndpoint {
            host: cfg.transport.network.host.clone(),
            port: cfg.transport.network.port,
            timeout: Duration::from_millis(10),
        }));
        let source = Box::new(PatternSource::new(64, 36, 200));

        let svc = Arc::clone(&service);
        let handle = tokio::spawn(async move { svc.run_with(source, transport).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(service.is_running());
        stop.store(false, Ordering::SeqCst);

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.reason, StopReason::Stopped);
        assert!(outcome.stats.frames_sent > 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_handle_ends_a_stalled_raw_input() {
        use std::os::unix::net::UnixStream;

        use crate::source::RawVideoSource;

        let dev = device();
        let cfg = config_for(&dev);
        // The writer stays open and silent for the whole session.
        let (reader, _writer) = UnixStream::pair().unwrap();
        let source = Box::new(
            RawVideoSource::polled(reader, 64, 36, Duration::from_millis(20)).unwrap(),
        );
        let transport = transport::open(cfg.endpoint());

        let service = Arc::new(AmbiluxService::new(cfg));
        let stop = service.stop_handle();
        let svc = Arc::clone(&service);
        let link = Arc::clone(&transport);
        let handle = tokio::spawn(async move { svc.run_with(source, link).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.store(false, Ordering::SeqCst);

        let outcome = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("service did not stop")
            .unwrap()
            .unwrap();
        assert_eq!(outcome.reason, StopReason::Stopped);
        assert_eq!(outcome.stats.frames_sent, 0);
        assert!(outcome.stats.gaps > 0);
        assert!(!transport.is_initialized());
    }

    #[tokio::test]
    async fn invalid_geometry_fails_before_opening() {
        let dev = device();
        let mut cfg = config_for(&dev);
        cfg.capture.depth = 0;
        let transport = transport::open(cfg.endpoint());
        let service = AmbiluxService::new(cfg);
        let err = service
            .run_with(Box::new(PatternSource::new(64, 36, 0)), transport.clone())
            .await
            .unwrap_err();
        assert!(err.is_configuration());
        assert!(!transport.is_initialized());
    }
}
