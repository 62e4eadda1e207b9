//! `BridgeAdapter` — three named operations in front of a detector.
//!
//! ## Call surface
//!
//! | Operation | Args | Success | Fault |
//! |-----------|------|---------|-------|
//! | `initialize` | `hopSize?` (default 256), `threshold?` (default 0.5) | `{version}` | `INIT_FAILED` |
//! | `processPcm` | `pcm` (base64 LE i16) | `{speech, probability}` | `PROCESS_FAILED` |
//! | `release` | — | `true` | `RELEASE_FAILED` |
//!
//! Any other operation name is answered with a not-implemented reply.
//!
//! ## Ownership
//!
//! The adapter is synchronous and exclusively owned: every operation
//! takes `&mut self` and fully completes before the next one can start.
//! It holds at most one live detector session plus a scratch window
//! buffer whose length always equals that session's hop size.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::engine::{VadBackend, VadSession};
use crate::error::{LimenError, Result};
use crate::pcm;
use crate::wire::{
    CallFault, CallReply, ChunkVerdict, FaultKind, InitArgs, InitReply, PcmArgs, DEFAULT_HOP_SIZE,
    DEFAULT_THRESHOLD,
};

/// A live detector with its fixed-size scratch window.
struct ActiveSession {
    session: Box<dyn VadSession>,
    hop_size: usize,
    /// Refilled in place for every window; length always equals `hop_size`.
    scratch: Vec<i16>,
}

/// Bridge adapter holding at most one detector session.
pub struct BridgeAdapter {
    backend: Box<dyn VadBackend>,
    active: Option<ActiveSession>,
}

impl BridgeAdapter {
    pub fn new(backend: Box<dyn VadBackend>) -> Self {
        Self {
            backend,
            active: None,
        }
    }

    /// Whether a detector session is currently held.
    pub fn is_initialized(&self) -> bool {
        self.active.is_some()
    }

    /// Replace any held session with a freshly configured one and return
    /// the backend's version identifier.
    ///
    /// The old session is taken out of the adapter before it is closed,
    /// so a failure on either the close or the open always leaves the
    /// adapter uninitialized.
    ///
    /// # Errors
    /// Propagates a close failure of the previous session and any
    /// backend rejection of the new configuration.
    pub fn initialize(&mut self, hop_size: usize, threshold: f32) -> Result<String> {
        if let Some(mut old) = self.active.take() {
            old.session.close()?;
        }
        if hop_size == 0 {
            return Err(LimenError::InvalidConfig(
                "hop size must be positive".into(),
            ));
        }
        let session = self.backend.open(hop_size, threshold)?;
        let version = self.backend.version();
        self.active = Some(ActiveSession {
            session,
            hop_size,
            scratch: vec![0; hop_size],
        });
        info!(version = %version, hop_size, threshold, "detector initialized");
        Ok(version)
    }

    /// Score one PCM chunk.
    ///
    /// An empty buffer or an uninitialized adapter yields
    /// [`ChunkVerdict::SILENT`] — a defined answer, not an error. The
    /// bytes are decoded as little-endian i16 and scored one complete
    /// window at a time, in arrival order; an odd trailing byte and a
    /// trailing partial window are dropped.
    ///
    /// # Errors
    /// A session failure on any window aborts the rest of the chunk; no
    /// partial aggregate is returned.
    pub fn process_pcm(&mut self, bytes: &[u8]) -> Result<ChunkVerdict> {
        let Some(active) = self.active.as_mut() else {
            return Ok(ChunkVerdict::SILENT);
        };
        if bytes.is_empty() {
            return Ok(ChunkVerdict::SILENT);
        }

        let samples = pcm::decode_i16le(bytes);

        let mut verdict = ChunkVerdict::SILENT;
        for window in samples.chunks_exact(active.hop_size) {
            active.scratch.copy_from_slice(window);
            let score = active.session.process(&active.scratch)?;
            if score.probability > verdict.probability {
                verdict.probability = score.probability;
            }
            if score.is_speech {
                verdict.speech = true;
            }
        }
        Ok(verdict)
    }

    /// Close and drop the held session, if any.
    ///
    /// Releasing an uninitialized adapter is a successful no-op. On a
    /// close failure the session reference is left in place so the call
    /// can be retried; backends keep `close` safe to repeat.
    pub fn release(&mut self) -> Result<bool> {
        if let Some(active) = self.active.as_mut() {
            active.session.close()?;
            self.active = None;
        }
        Ok(true)
    }

    /// Dispatch one named call with a JSON argument map.
    pub fn handle_call(&mut self, method: &str, args: &Value) -> CallReply {
        match method {
            "initialize" => self.call_initialize(args),
            "processPcm" => self.call_process_pcm(args),
            "release" => self.call_release(),
            _ => CallReply::NotImplemented,
        }
    }

    fn call_initialize(&mut self, args: &Value) -> CallReply {
        let parsed = match parse_args::<InitArgs>(args) {
            Ok(v) => v,
            Err(e) => return log_fault(FaultKind::InitFailed, &e),
        };
        let hop_size = parsed
            .hop_size
            .map(|v| v as usize)
            .unwrap_or(DEFAULT_HOP_SIZE);
        let threshold = parsed.threshold.unwrap_or(DEFAULT_THRESHOLD);
        match self.initialize(hop_size, threshold) {
            Ok(version) => success(FaultKind::InitFailed, &InitReply { version }),
            Err(e) => log_fault(FaultKind::InitFailed, &e),
        }
    }

    fn call_process_pcm(&mut self, args: &Value) -> CallReply {
        let bytes = match parse_args::<PcmArgs>(args).and_then(|a| a.decode()) {
            Ok(v) => v,
            Err(e) => return log_fault(FaultKind::ProcessFailed, &e),
        };
        match self.process_pcm(&bytes) {
            Ok(verdict) => success(FaultKind::ProcessFailed, &verdict),
            Err(e) => log_fault(FaultKind::ProcessFailed, &e),
        }
    }

    fn call_release(&mut self) -> CallReply {
        match self.release() {
            Ok(flag) => CallReply::Success(Value::Bool(flag)),
            Err(e) => log_fault(FaultKind::ReleaseFailed, &e),
        }
    }
}

/// Deserialize an argument map; an absent map means all-defaults.
fn parse_args<T: serde::de::DeserializeOwned + Default>(args: &Value) -> Result<T> {
    if args.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(args.clone())
        .map_err(|e| LimenError::BadArguments(e.to_string()))
}

fn success<T: Serialize>(kind: FaultKind, payload: &T) -> CallReply {
    match serde_json::to_value(payload) {
        Ok(value) => CallReply::Success(value),
        Err(e) => CallReply::Fault(CallFault {
            kind,
            message: format!("reply serialization failed: {e}"),
        }),
    }
}

fn log_fault(kind: FaultKind, err: &LimenError) -> CallReply {
    error!(?kind, %err, "bridge call failed");
    CallReply::Fault(CallFault {
        kind,
        message: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::engine::FrameScore;

    /// Shared script driving and recording a fake detector.
    #[derive(Default)]
    struct Script {
        /// Every window handed to `process`, in call order.
        windows: Vec<Vec<i16>>,
        opens: Vec<(usize, f32)>,
        process_calls: usize,
        close_calls: usize,
        /// 1-based call index at which `process` fails.
        fail_process_at: Option<usize>,
        fail_close: bool,
        /// Per-call scores; falls back to a silent score when exhausted.
        scores: VecDeque<FrameScore>,
    }

    struct ScriptedBackend {
        script: Arc<Mutex<Script>>,
    }

    struct ScriptedSession {
        script: Arc<Mutex<Script>>,
    }

    impl VadBackend for ScriptedBackend {
        fn version(&self) -> String {
            "scripted 1.0".into()
        }

        fn open(&self, hop_size: usize, threshold: f32) -> Result<Box<dyn VadSession>> {
            self.script.lock().unwrap().opens.push((hop_size, threshold));
            Ok(Box::new(ScriptedSession {
                script: Arc::clone(&self.script),
            }))
        }
    }

    impl VadSession for ScriptedSession {
        fn process(&mut self, window: &[i16]) -> Result<FrameScore> {
            let mut script = self.script.lock().unwrap();
            script.process_calls += 1;
            if script.fail_process_at == Some(script.process_calls) {
                return Err(LimenError::Session("scripted failure".into()));
            }
            script.windows.push(window.to_vec());
            Ok(script.scores.pop_front().unwrap_or(FrameScore {
                probability: 0.0,
                is_speech: false,
            }))
        }

        fn close(&mut self) -> Result<()> {
            let mut script = self.script.lock().unwrap();
            if script.fail_close {
                return Err(LimenError::Session("scripted close failure".into()));
            }
            script.close_calls += 1;
            Ok(())
        }
    }

    fn scripted_adapter() -> (BridgeAdapter, Arc<Mutex<Script>>) {
        let script = Arc::new(Mutex::new(Script::default()));
        let adapter = BridgeAdapter::new(Box::new(ScriptedBackend {
            script: Arc::clone(&script),
        }));
        (adapter, script)
    }

    fn score(probability: f32, is_speech: bool) -> FrameScore {
        FrameScore {
            probability,
            is_speech,
        }
    }

    /// Bytes for `n` consecutive samples starting at `start`.
    fn ramp_bytes(start: i16, n: usize) -> Vec<u8> {
        let samples: Vec<i16> = (0..n as i16).map(|i| start + i).collect();
        pcm::encode_i16le(&samples)
    }

    #[test]
    fn process_before_initialize_returns_silent_default() {
        let (mut adapter, script) = scripted_adapter();
        let verdict = adapter.process_pcm(&ramp_bytes(0, 16)).expect("process");
        assert_eq!(verdict, ChunkVerdict::SILENT);
        assert_eq!(script.lock().unwrap().process_calls, 0);
    }

    #[test]
    fn empty_pcm_returns_silent_default_without_engine_calls() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        let verdict = adapter.process_pcm(&[]).expect("process");
        assert_eq!(verdict, ChunkVerdict::SILENT);
        assert_eq!(script.lock().unwrap().process_calls, 0);
    }

    #[test]
    fn initialize_passes_config_to_backend() {
        let (mut adapter, script) = scripted_adapter();
        let version = adapter.initialize(320, 0.7).expect("initialize");
        assert_eq!(version, "scripted 1.0");
        assert_eq!(script.lock().unwrap().opens, vec![(320, 0.7)]);
    }

    #[test]
    fn aligned_chunk_classifies_every_window_in_order() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        {
            let mut s = script.lock().unwrap();
            s.scores = VecDeque::from(vec![
                score(0.2, false),
                score(0.9, true),
                score(0.4, false),
            ]);
        }

        let verdict = adapter.process_pcm(&ramp_bytes(0, 12)).expect("process");
        assert!(verdict.speech);
        assert!((verdict.probability - 0.9).abs() < 1e-6);

        let s = script.lock().unwrap();
        assert_eq!(s.process_calls, 3);
        assert_eq!(
            s.windows,
            vec![
                vec![0, 1, 2, 3],
                vec![4, 5, 6, 7],
                vec![8, 9, 10, 11],
            ]
        );
    }

    #[test]
    fn misaligned_tail_is_dropped() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        adapter.process_pcm(&ramp_bytes(0, 10)).expect("process");
        let s = script.lock().unwrap();
        assert_eq!(s.process_calls, 2);
        assert_eq!(s.windows.last().expect("windows"), &vec![4, 5, 6, 7]);
    }

    #[test]
    fn odd_trailing_byte_is_dropped_before_windowing() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        let mut bytes = ramp_bytes(0, 4);
        bytes.push(0x7F);
        adapter.process_pcm(&bytes).expect("process");
        assert_eq!(script.lock().unwrap().process_calls, 1);
    }

    #[test]
    fn chunk_shorter_than_one_window_is_silent_with_zero_engine_calls() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        let verdict = adapter.process_pcm(&ramp_bytes(0, 3)).expect("process");
        assert_eq!(verdict, ChunkVerdict::SILENT);
        assert_eq!(script.lock().unwrap().process_calls, 0);
    }

    #[test]
    fn reinitialize_windows_with_the_new_hop_size() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        adapter.process_pcm(&ramp_bytes(0, 8)).expect("process");

        adapter.initialize(2, 0.5).expect("reinitialize");
        adapter.process_pcm(&ramp_bytes(0, 8)).expect("process");

        let s = script.lock().unwrap();
        // Old session was closed by the replacement.
        assert_eq!(s.close_calls, 1);
        assert_eq!(&s.windows[..2], &[vec![0, 1, 2, 3], vec![4, 5, 6, 7]]);
        assert_eq!(
            &s.windows[2..],
            &[vec![0, 1], vec![2, 3], vec![4, 5], vec![6, 7]]
        );
    }

    #[test]
    fn failure_mid_chunk_aborts_without_partial_verdict() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        {
            let mut s = script.lock().unwrap();
            s.fail_process_at = Some(3);
            s.scores = VecDeque::from(vec![score(0.9, true); 5]);
        }

        let err = adapter.process_pcm(&ramp_bytes(0, 20)).unwrap_err();
        assert!(matches!(err, LimenError::Session(_)), "{err}");

        // Windows 4 and 5 never reached the engine.
        let s = script.lock().unwrap();
        assert_eq!(s.process_calls, 3);
        assert_eq!(s.windows.len(), 2);
    }

    #[test]
    fn release_is_a_no_op_before_initialize_and_repeatable_after() {
        let (mut adapter, script) = scripted_adapter();
        assert!(adapter.release().expect("release without session"));

        adapter.initialize(4, 0.5).expect("initialize");
        assert!(adapter.release().expect("first release"));
        assert!(adapter.release().expect("second release"));
        assert_eq!(script.lock().unwrap().close_calls, 1);
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn failed_release_keeps_the_session_for_retry() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        script.lock().unwrap().fail_close = true;

        assert!(adapter.release().is_err());
        assert!(adapter.is_initialized());

        script.lock().unwrap().fail_close = false;
        assert!(adapter.release().expect("retried release"));
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn failed_initialize_always_leaves_the_adapter_uninitialized() {
        let (mut adapter, script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        script.lock().unwrap().fail_close = true;

        // Closing the previous session fails, so initialize fails — and
        // the stale session must not survive it.
        assert!(adapter.initialize(8, 0.5).is_err());
        assert!(!adapter.is_initialized());

        let verdict = adapter.process_pcm(&ramp_bytes(0, 16)).expect("process");
        assert_eq!(verdict, ChunkVerdict::SILENT);
    }

    #[test]
    fn zero_hop_size_is_rejected() {
        let (mut adapter, _script) = scripted_adapter();
        let err = adapter.initialize(0, 0.5).unwrap_err();
        assert!(matches!(err, LimenError::InvalidConfig(_)), "{err}");
        assert!(!adapter.is_initialized());
    }

    #[test]
    fn unknown_method_is_not_implemented() {
        let (mut adapter, _script) = scripted_adapter();
        let reply = adapter.handle_call("transcribe", &Value::Null);
        assert!(matches!(reply, CallReply::NotImplemented));
    }

    #[test]
    fn dispatch_applies_documented_defaults() {
        let (mut adapter, script) = scripted_adapter();
        let reply = adapter.handle_call("initialize", &Value::Null);
        assert!(matches!(reply, CallReply::Success(_)));
        assert_eq!(
            script.lock().unwrap().opens,
            vec![(DEFAULT_HOP_SIZE, DEFAULT_THRESHOLD)]
        );
    }

    #[test]
    fn malformed_initialize_arguments_fault_as_init_failed() {
        let (mut adapter, _script) = scripted_adapter();
        let reply = adapter.handle_call("initialize", &serde_json::json!({"threshold": "high"}));
        match reply {
            CallReply::Fault(fault) => assert_eq!(fault.kind, FaultKind::InitFailed),
            other => panic!("expected fault, got {other:?}"),
        }
    }

    #[test]
    fn undecodable_pcm_faults_as_process_failed() {
        let (mut adapter, _script) = scripted_adapter();
        adapter.initialize(4, 0.5).expect("initialize");
        let reply =
            adapter.handle_call("processPcm", &serde_json::json!({"pcm": "!!not-base64!!"}));
        match reply {
            CallReply::Fault(fault) => assert_eq!(fault.kind, FaultKind::ProcessFailed),
            other => panic!("expected fault, got {other:?}"),
        }
    }
}
