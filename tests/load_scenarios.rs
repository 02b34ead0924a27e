//! Callback-style load/typeset scenarios against the in-memory page

use mathjax_loader::memory::{HubEvent, MemoryPage};
use mathjax_loader::{
    Callback, ElementHandle, Error, HubConfig, LoadStatus, LoaderConfig, MathRenderer,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn setup(page: MemoryPage) -> (Arc<MemoryPage>, MathRenderer) {
    let page = Arc::new(page);
    let config = LoaderConfig {
        module_dir: PathBuf::from("/app/lib"),
        ..Default::default()
    };
    let renderer = MathRenderer::new(config, page.clone());
    (page, renderer)
}

fn counter() -> (Arc<AtomicUsize>, Callback) {
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    (hits, Box::new(move || {
        h.fetch_add(1, Ordering::SeqCst);
    }))
}

#[test]
fn already_bound_library_skips_injection() {
    let (page, renderer) = setup(MemoryPage::with_library());
    let (hits, cb) = counter();

    renderer.load_math_jax(&*page, Some(cb)).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(page.scripts().is_empty());
    assert_eq!(page.hub().unwrap().config_calls(), 0);
    assert_eq!(renderer.status(), LoadStatus::Ready);
}

#[test]
fn unbound_library_attaches_one_script() {
    let (page, renderer) = setup(MemoryPage::new());

    renderer.load_math_jax(&*page, None).unwrap();

    let scripts = page.scripts();
    assert_eq!(scripts.len(), 1);
    assert!(scripts[0].ends_with("MathJax/MathJax.js?delayStartupUntil=configured"));
    assert_eq!(scripts[0], "/app/resources/MathJax/MathJax.js?delayStartupUntil=configured");
    assert_eq!(page.script_types(), vec!["text/javascript".to_string()]);
}

#[test]
fn callback_waits_for_load_signal() {
    let (page, renderer) = setup(MemoryPage::new());
    let (hits, cb) = counter();

    renderer.load_math_jax(&*page, Some(cb)).unwrap();
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    page.complete_script_load(0);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn configuration_happens_once_before_first_ready() {
    let (page, renderer) = setup(MemoryPage::new());
    let observed = Arc::new(Mutex::new(Vec::new()));

    for _ in 0..3 {
        let page_ref = page.clone();
        let observed = observed.clone();
        renderer
            .load_math_jax(
                &*page,
                Some(Box::new(move || {
                    let hub = page_ref.hub().unwrap();
                    observed.lock().unwrap().push((hub.config_calls(), hub.is_configured()));
                })),
            )
            .unwrap();
    }
    assert_eq!(page.scripts().len(), 1);

    page.complete_script_load(0);
    renderer.load_math_jax(&*page, None).unwrap();

    let hub = page.hub().unwrap();
    assert_eq!(hub.config_calls(), 1);
    assert_eq!(hub.applied_config(), Some(HubConfig::default()));
    assert_eq!(*observed.lock().unwrap(), vec![(1, true); 3]);
    assert_eq!(page.scripts().len(), 1);
}

#[test]
fn insertion_failure_is_tagged_and_skips_callback() {
    let (page, renderer) = setup(MemoryPage::new());
    page.fail_insertions("Cannot read property 'appendChild' of undefined");
    let (hits, cb) = counter();

    let err = renderer.load_math_jax(&*page, Some(cb)).unwrap_err();

    assert!(matches!(err, Error::InsertionFailed { .. }));
    assert_eq!(err.message(), "Cannot read property 'appendChild' of undefined");
    assert_eq!(err.to_string(), "Cannot read property 'appendChild' of undefined");
    assert_eq!(err.operation().map(|o| o.tag()), Some("loadMathJax"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(renderer.status(), LoadStatus::NotLoaded);
}

#[test]
fn render_propagates_insertion_failure() {
    let (page, renderer) = setup(MemoryPage::new());
    page.fail_insertions("no head element");

    let err = renderer
        .process_math(&*page, &ElementHandle::new("#m"), None)
        .unwrap_err();

    assert_eq!(err.message(), "no head element");
    assert_eq!(err.operation().map(|o| o.tag()), Some("loadMathJax"));
}

#[test]
fn enqueue_failure_is_tagged() {
    let (page, renderer) = setup(MemoryPage::with_library());
    page.hub().unwrap().fail_enqueue("MathJax.Hub.Queue is not a function");
    let (hits, cb) = counter();

    let err = renderer.typeset_math(&ElementHandle::new("#m"), Some(cb)).unwrap_err();

    assert!(matches!(err, Error::EnqueueFailed { .. }));
    assert_eq!(err.message(), "MathJax.Hub.Queue is not a function");
    assert_eq!(err.operation().map(|o| o.tag()), Some("typesetMath"));
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn typeset_without_library_is_an_enqueue_failure() {
    let (_page, renderer) = setup(MemoryPage::new());
    let err = renderer.typeset_math(&ElementHandle::new("#m"), None).unwrap_err();
    assert_eq!(err.operation().map(|o| o.tag()), Some("typesetMath"));
    assert_eq!(err.message(), "MathJax is not defined");
}

#[test]
fn render_propagates_enqueue_failure_when_loaded() {
    let (page, renderer) = setup(MemoryPage::with_library());
    page.hub().unwrap().fail_enqueue("queue missing");

    let err = renderer
        .process_math(&*page, &ElementHandle::new("#m"), None)
        .unwrap_err();

    assert_eq!(err.message(), "queue missing");
    assert_eq!(err.operation().map(|o| o.tag()), Some("typesetMath"));
}

#[test]
fn deferred_enqueue_failure_is_not_returned_later() {
    let (page, renderer) = setup(MemoryPage::new());
    let (hits, cb) = counter();

    renderer
        .process_math(&*page, &ElementHandle::new("#m"), Some(cb))
        .unwrap();
    page.bind_library().fail_enqueue("queue missing");
    page.complete_script_load(0);

    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(page.hub().unwrap().pending_jobs(), 0);
}

#[test]
fn render_from_scratch() {
    let (page, renderer) = setup(MemoryPage::new());
    let (hits, cb) = counter();
    let el = ElementHandle::new("#math");

    renderer.process_math(&*page, &el, Some(cb)).unwrap();
    assert!(page.scripts()[0].ends_with("?delayStartupUntil=configured"));
    assert!(page.hub().is_none());

    page.complete_script_load(0);
    let hub = page.hub().unwrap();
    assert_eq!(hub.config_calls(), 1);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    hub.process_queue();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert_eq!(hub.typeset_containers(), vec![el.clone()]);

    let events = hub.events();
    let configured = events.iter().position(|e| *e == HubEvent::Configured).unwrap();
    let queued = events.iter().position(|e| *e == HubEvent::Queued(el.clone())).unwrap();
    assert!(configured < queued);
}

#[test]
fn render_with_library_present() {
    let (page, renderer) = setup(MemoryPage::with_library());
    let (hits, cb) = counter();
    let el = ElementHandle::new("#math");

    renderer.process_math(&*page, &el, Some(cb)).unwrap();
    assert!(page.scripts().is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    page.hub().unwrap().process_queue();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn no_typeset_before_load_signal_for_interleaved_renders() {
    let (page, renderer) = setup(MemoryPage::new());
    let first = ElementHandle::new("#a");
    let second = ElementHandle::new("#b");

    renderer.process_math(&*page, &first, None).unwrap();
    renderer.load_math_jax(&*page, None).unwrap();
    renderer.process_math(&*page, &second, None).unwrap();
    assert!(page.hub().is_none());
    assert_eq!(page.scripts().len(), 1);

    page.complete_script_load(0);
    let hub = page.hub().unwrap();
    assert_eq!(
        hub.events()[..2],
        [HubEvent::Config(HubConfig::default()), HubEvent::Configured]
    );
    assert_eq!(hub.process_queue(), 2);
    assert_eq!(hub.typeset_containers(), vec![first, second]);
}

#[test]
fn omitted_callbacks_are_noops() {
    let (page, renderer) = setup(MemoryPage::new());
    let el = ElementHandle::new("#m");

    renderer.load_math_jax(&*page, None).unwrap();
    page.complete_script_load(0);
    renderer.typeset_math(&el, None).unwrap();
    renderer.process_math(&*page, &el, None).unwrap();

    assert_eq!(page.hub().unwrap().process_queue(), 2);
}

#[test]
fn failed_insertion_allows_a_later_attempt() {
    let (page, renderer) = setup(MemoryPage::new());
    page.fail_insertions("detached document");
    assert!(renderer.load_math_jax(&*page, None).is_err());

    let fresh = MemoryPage::new();
    renderer.load_math_jax(&fresh, None).unwrap();
    assert_eq!(fresh.scripts().len(), 1);
    assert_eq!(renderer.status(), LoadStatus::Loading);
}
