use faceroll::common::StoreConfig;
use faceroll::{AttendanceEvent, AttendanceLedger, Database, Identity, IdentityStore, EMBEDDING_DIM};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

fn identity(n: usize) -> Identity {
    let mut embedding = vec![0.0; EMBEDDING_DIM];
    embedding[n % EMBEDDING_DIM] = 1.0;
    Identity {
        identity_id: format!("S{:03}", n),
        display_name: format!("Student {}", n),
        reference_image_path: format!("/faces/{}.jpg", n),
        embedding,
    }
}

#[test]
fn readers_never_observe_half_enrolled_identities() {
    let db = Database::open_in_memory().unwrap();
    let store = IdentityStore::new(db, &StoreConfig::default());
    let done = Arc::new(AtomicBool::new(false));

    let writer = {
        let store = store.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            for n in 0..60 {
                store.enroll(&identity(n)).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    let reader = {
        let store = store.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let mut query = vec![0.0; EMBEDDING_DIM];
            query[0] = 1.0;
            let mut seen = 0;
            loop {
                let finished = done.load(Ordering::SeqCst);
                let hits = store.find_similar(&query, 1000).unwrap();
                assert!(hits.len() >= seen, "gallery shrank from {} to {}", seen, hits.len());
                for hit in &hits {
                    assert_eq!(hit.identity.embedding.len(), EMBEDDING_DIM);
                    let n: usize = hit.identity.identity_id[1..].parse().unwrap();
                    assert_eq!(hit.identity.display_name, format!("Student {}", n));
                }
                seen = hits.len();
                if finished {
                    break;
                }
            }
            seen
        })
    };

    writer.join().unwrap();
    assert_eq!(reader.join().unwrap(), 60);
    assert_eq!(store.count().unwrap(), 60);
}

#[test]
fn ledger_accepts_writes_from_worker_threads() {
    let db = Database::open_in_memory().unwrap();
    let store = IdentityStore::new(db.clone(), &StoreConfig::default());
    for n in 0..4 {
        store.enroll(&identity(n)).unwrap();
    }
    let ledger = AttendanceLedger::new(db);

    let workers: Vec<_> = (0..4)
        .map(|n| {
            let ledger = ledger.clone();
            thread::spawn(move || {
                for frame in 0..5 {
                    let event = AttendanceEvent::new(format!("S{:03}", n), format!("/frames/{}-{}.jpg", n, frame));
                    ledger.record(&event).unwrap();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(ledger.count().unwrap(), 20);
}

#[test]
fn data_survives_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("faceroll.db");

    {
        let db = Database::open(&path).unwrap();
        let store = IdentityStore::new(db.clone(), &StoreConfig::default());
        store.enroll(&identity(7)).unwrap();
        let mut event = AttendanceEvent::new("S007", "/frames/7.jpg");
        event.event_id = "E7".into();
        AttendanceLedger::new(db).record(&event).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let store = IdentityStore::new(db.clone(), &StoreConfig::default());
    let restored = store.get("S007").unwrap().expect("identity persisted");
    assert_eq!(restored.display_name, "Student 7");
    assert_eq!(restored.embedding, identity(7).embedding);

    let events = AttendanceLedger::new(db).list(1, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_id, "E7");
    assert_eq!(events[0].identity_id, "S007");
}
