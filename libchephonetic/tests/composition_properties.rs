//! Properties of composition and table loading that hold across layouts.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use libchephonetic::{
    CompositionEngine, KeyboardLayout, PhoneticClassifier, SlotClass, TableKind,
    TableLoadCoordinator, BOPOMOFO,
};
use libcin_core::{
    EnsureOutcome, LoadError, LoadState, TableContent, TableEntry, TableIdentity, TableLoader,
};

const STANDARD: &str = "1qaz2wsxedcrfv5tgbyhnujm8ik,9ol.0p;/-7634";

fn symbol_table() -> TableContent {
    let mut table = TableContent::new();
    for (key, symbol) in STANDARD.chars().zip(BOPOMOFO.chars()) {
        table.insert_keyname(key, symbol.to_string());
    }
    table
}

/// Physical keys of `layout`, grouped by the class they type.
fn keys_by_class(layout: KeyboardLayout) -> [Vec<char>; 4] {
    let classifier = PhoneticClassifier::new(layout);
    let mut out: [Vec<char>; 4] = Default::default();
    for key in layout.keys().chars() {
        let (class, _) = classifier.classify_key(key).unwrap();
        out[class.index()].push(key);
    }
    out
}

fn symbol_of(layout: KeyboardLayout, key: char) -> char {
    BOPOMOFO.chars().nth(layout.position(key).unwrap()).unwrap()
}

#[test]
fn rendering_is_class_order_concatenation_for_every_layout() {
    let table = symbol_table();
    for layout in KeyboardLayout::ALL {
        let groups = keys_by_class(layout);
        // every initial and final with a rotating medial and tone; empty slots included
        for (i, &initial) in groups[0].iter().enumerate() {
            for (f, &fin) in groups[2].iter().enumerate() {
                let medial = groups[1].get((i + f) % (groups[1].len() + 1)).copied();
                let tone = groups[3].get((i * 3 + f) % (groups[3].len() + 1)).copied();
                let picked = [Some(initial), medial, Some(fin), tone];
                let expected: String = picked
                    .iter()
                    .flatten()
                    .map(|&k| symbol_of(layout, k))
                    .collect();

                // typed back to front: order of entry must not matter
                let mut engine = CompositionEngine::new(PhoneticClassifier::new(layout));
                engine.set_use_end_key(false);
                for key in picked.iter().rev().flatten() {
                    engine.accept_key(*key).unwrap();
                }
                let rendered = engine.render(&table);
                assert_eq!(rendered.display, expected, "{layout}: {picked:?}");
                assert_eq!(rendered.code.chars().count(), expected.chars().count());
            }
        }
    }
}

#[test]
fn two_keys_of_one_class_keep_only_the_second() {
    let table = symbol_table();
    for layout in KeyboardLayout::ALL {
        let groups = keys_by_class(layout);
        for class in SlotClass::ALL {
            let keys = &groups[class.index()];
            let (first, second) = (keys[0], keys[keys.len() - 1]);
            let mut engine = CompositionEngine::new(PhoneticClassifier::new(layout));
            engine.set_use_end_key(false);
            engine.accept_key(first).unwrap();
            engine.accept_key(second).unwrap();
            assert_eq!(
                engine.render(&table).display,
                symbol_of(layout, second).to_string(),
                "{layout} {class}"
            );
        }
    }
}

#[test]
fn backspace_undoes_the_last_key() {
    let table = symbol_table();
    let sequences = ["1u8", "1q", "u1u", "83j4", "1u87", "qq"];
    for seq in sequences {
        for extra in ['a', 'm', ';', '6'] {
            let classifier = PhoneticClassifier::new(KeyboardLayout::Standard);
            let mut typed = CompositionEngine::new(classifier);
            let mut direct = typed.clone();
            for key in seq.chars() {
                typed.accept_key(key).unwrap();
                direct.accept_key(key).unwrap();
            }
            // at the key limit shadowed keys are compacted away and cannot come back
            if typed.raw_keys().len() >= typed.max_len() || typed.accept_key(extra).is_err() {
                continue;
            }
            typed.backspace();
            assert_eq!(typed.render(&table), direct.render(&table), "{seq} + {extra}");
        }
    }
}

/// Loader that counts starts and blocks until the test releases it.
struct CountingLoader {
    starts: AtomicUsize,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl TableLoader for CountingLoader {
    fn load_table(&self, identity: &TableIdentity) -> Result<TableContent, LoadError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        let _ = self
            .gate
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5));
        let mut table = symbol_table();
        table.insert_chardef("1u3", format!("selection-{}", identity.selection));
        Ok(table)
    }
}

fn gated() -> (Arc<CountingLoader>, mpsc::Sender<()>) {
    let (tx, rx) = mpsc::channel();
    let loader = Arc::new(CountingLoader {
        starts: AtomicUsize::new(0),
        gate: Mutex::new(rx),
    });
    (loader, tx)
}

#[test]
fn racing_callers_start_a_single_load() {
    let (loader, release) = gated();
    let coordinator = TableLoadCoordinator::new(loader.clone());
    let entry = Arc::new(TableEntry::new(TableKind::Main));
    let identity = TableIdentity::single(0, "thphonetic.cin");

    let callers: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = coordinator.clone();
            let entry = entry.clone();
            let identity = identity.clone();
            std::thread::spawn(move || coordinator.wait_ready(&entry, &identity))
        })
        .collect();

    // let the callers pile up on the in-flight load before releasing it
    while entry.state() != LoadState::Loading {
        std::thread::yield_now();
    }
    release.send(()).unwrap();

    for caller in callers {
        let content = caller.join().unwrap().unwrap();
        assert_eq!(content.candidates("1u3"), ["selection-0"]);
    }
    assert_eq!(loader.starts.load(Ordering::SeqCst), 1);
    assert_eq!(entry.loads_started(), 1);
}

#[test]
fn ensure_loaded_on_a_ready_entry_loads_nothing() {
    let (loader, release) = gated();
    let coordinator = TableLoadCoordinator::new(loader.clone());
    let entry = Arc::new(TableEntry::new(TableKind::Homophone));
    let identity = TableIdentity::single(0, "bpmf.cin");

    release.send(()).unwrap();
    coordinator.wait_ready(&entry, &identity).unwrap();
    for _ in 0..2 {
        assert!(matches!(
            coordinator.ensure_loaded(&entry, &identity).unwrap(),
            EnsureOutcome::Ready(_)
        ));
    }
    assert_eq!(loader.starts.load(Ordering::SeqCst), 1);
}

#[test]
fn identity_change_passes_through_loading() {
    let (loader, release) = gated();
    let coordinator = TableLoadCoordinator::new(loader);
    let entry = Arc::new(TableEntry::new(TableKind::Main));
    let first = TableIdentity::single(0, "thphonetic.cin");
    let second = TableIdentity::single(2, "bpmf.cin");

    release.send(()).unwrap();
    coordinator.wait_ready(&entry, &first).unwrap();
    assert_eq!(entry.state(), LoadState::Ready);

    let handle = match coordinator.ensure_loaded(&entry, &second).unwrap() {
        EnsureOutcome::Started(handle) => handle,
        EnsureOutcome::Ready(_) => panic!("new identity must load"),
    };
    assert_eq!(entry.state(), LoadState::Loading);
    // nothing to render against until the new content is published
    assert!(entry.content().is_none());
    assert!(entry.ready_content(&second).is_none());

    release.send(()).unwrap();
    let content = handle.wait().unwrap();
    assert_eq!(entry.state(), LoadState::Ready);
    assert_eq!(content.candidates("1u3"), ["selection-2"]);

    let mut engine = CompositionEngine::new(PhoneticClassifier::new(KeyboardLayout::Standard));
    for key in "1u3".chars() {
        engine.accept_key(key).unwrap();
    }
    let table = entry.content().unwrap();
    assert_eq!(engine.render(&table).candidates, ["selection-2"]);
}
