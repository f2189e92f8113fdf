//! Panic hook and diagnostic layer, end to end.

use std::{panic, thread};

use tracing_subscriber::{Registry, layer::SubscriberExt};

use tether_engine::{
    AppSettings, Application, DiagnosticLayer, Severity, install_panic_hook,
};

use crate::common::{Recorder, serial, tick_until_finished};

#[test]
fn worker_panic_is_shown_on_the_loop_thread() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();
    install_panic_hook(false);

    let worker = thread::Builder::new()
        .name("indexer".to_string())
        .spawn(|| {
            let empty: Vec<u8> = Vec::new();
            let index = empty.len() + 2;
            empty[index]
        })
        .unwrap();
    let joined = tick_until_finished(&app, worker);
    let _ = panic::take_hook();

    assert!(joined.is_err());
    let shown = recorder.shown();
    let panic_fault = shown
        .iter()
        .find(|shown| shown.fault.title() == "Panic")
        .expect("panic was shown");
    assert_eq!(panic_fault.fault.severity(), Severity::Critical);
    assert!(panic_fault.fault.summary().contains("index out of bounds"));
    assert!(panic_fault.fault.detail()[0].starts_with("thread 'indexer' panicked at"));
    assert_eq!(panic_fault.thread, thread::current().id());
}

#[test]
fn worker_diagnostics_cross_to_the_loop_thread() {
    let _serial = serial();
    let recorder = Recorder::default();
    let app = Application::init(recorder.clone(), AppSettings::default()).unwrap();

    let worker = thread::spawn(|| {
        let subscriber = Registry::default().with(DiagnosticLayer::new(Severity::Warning));
        tracing::subscriber::with_default(subscriber, || {
            tracing::debug!("routine");
            tracing::error!(shard = 7, "replica lost");
        });
    });
    tick_until_finished(&app, worker).unwrap();

    let shown = recorder.shown();
    assert_eq!(shown.len(), 1);
    let fault = &shown[0].fault;
    assert_eq!(fault.severity(), Severity::Critical);
    assert_eq!(fault.title(), "Critical Diagnostic");
    assert!(fault.summary().starts_with("Critical Diagnostic: replica lost ("));
    assert!(fault.detail().iter().any(|line| line == "shard = 7"));
    assert_eq!(fault.detail().last(), Some(&fault.summary().to_string()));
}
