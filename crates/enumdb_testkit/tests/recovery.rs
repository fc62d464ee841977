//! Reopen and crash recovery scenarios.

use enumdb_core::{
    AppendLog, CoreError, DurableEnumerator, DurableHashMap, DurableLog, Enumerator,
    EnumeratorConfig, EnumeratorFactory, Id, IndexKind, IntMultiMap, StorePaths, StringCodec,
    FRAME_HEADER_LEN,
};
use enumdb_storage::FileBackend;
use enumdb_testkit::prelude::*;

fn s(text: &str) -> String {
    text.to_string()
}

#[test]
fn alpha_beta_gamma_scenario() {
    let store = TempStore::new();
    {
        let names = store.open();
        assert_eq!(names.enumerate(&s("alpha")).unwrap(), Id::new(1));
        assert_eq!(names.enumerate(&s("beta")).unwrap(), Id::new(2));
        assert_eq!(names.enumerate(&s("alpha")).unwrap(), Id::new(1));
        names.close().unwrap();
    }

    let names = store.open();
    assert_eq!(names.try_enumerate(&s("alpha")).unwrap(), Some(Id::new(1)));
    assert_eq!(names.try_enumerate(&s("gamma")).unwrap(), None);
    assert_eq!(names.value_of(Id::new(2)).unwrap(), Some(s("beta")));
}

#[test]
fn emptied_index_rebuilt_from_log() {
    let store = TempStore::new();
    let keys = numbered_keys(300);
    let ids: Vec<Id> = {
        let names = store.open();
        let ids = keys.iter().map(|k| names.enumerate(k).unwrap()).collect();
        names.close().unwrap();
        ids
    };

    empty_index(&store.paths()).unwrap();

    let names = store.open();
    for (key, id) in keys.iter().zip(&ids) {
        assert_eq!(names.try_enumerate(key).unwrap(), Some(*id));
    }
}

#[test]
fn deleted_index_rebuilt_from_log() {
    let store = TempStore::new();
    {
        let names = store.open();
        names.enumerate(&s("alpha")).unwrap();
        names.close().unwrap();
    }
    remove_index(&store.paths()).unwrap();

    let names = store.open();
    assert_eq!(names.try_enumerate(&s("alpha")).unwrap(), Some(Id::new(1)));
    assert!(store.paths().index.exists());
}

#[test]
fn torn_log_tail_loses_only_the_torn_key() {
    let store = TempStore::new();
    let config = EnumeratorConfig::new().index_kind(IndexKind::InMemory);
    {
        let names = store.open_with(config.clone());
        names.enumerate(&s("alpha")).unwrap();
        names.enumerate(&s("beta")).unwrap();
        names.close().unwrap();
    }
    tear_tail(store.base(), 2).unwrap();

    let names = store.open_with(config);
    assert_eq!(names.len(), 1);
    assert_eq!(names.try_enumerate(&s("alpha")).unwrap(), Some(Id::new(1)));
    assert_eq!(names.try_enumerate(&s("beta")).unwrap(), None);
    assert_eq!(names.enumerate(&s("beta")).unwrap(), Id::new(2));
}

#[test]
fn half_written_frame_is_trimmed() {
    let store = TempStore::new();
    {
        let names = store.open();
        names.enumerate(&s("alpha")).unwrap();
        names.close().unwrap();
    }
    let before = file_len(store.base()).unwrap();
    append_garbage(store.base(), &[40, 0, 0, 0, 1, 2]).unwrap();

    let names = store.open();
    assert_eq!(names.len(), 1);
    assert_eq!(names.enumerate(&s("beta")).unwrap(), Id::new(2));
    names.close().unwrap();
    assert!(file_len(store.base()).unwrap() > before);
}

#[test]
fn corrupted_record_fails_the_open() {
    let store = TempStore::new();
    let config = EnumeratorConfig::new().index_kind(IndexKind::InMemory);
    {
        let names = store.open_with(config.clone());
        names.enumerate(&s("alpha")).unwrap();
        names.close().unwrap();
    }
    // Last byte of the only payload.
    let len = file_len(store.base()).unwrap();
    flip_byte(store.base(), len - 1).unwrap();

    let result = EnumeratorFactory::new(config).open(store.base(), StringCodec);
    assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
}

#[test]
fn corrupted_index_header_fails_the_open() {
    let store = TempStore::new();
    {
        let names = store.open();
        names.enumerate(&s("alpha")).unwrap();
        names.close().unwrap();
    }
    flip_byte(&store.paths().index, 0).unwrap();

    let result = EnumeratorFactory::default().open(store.base(), StringCodec);
    assert!(matches!(result, Err(CoreError::IndexCorruption { .. })));
}

#[test]
fn crash_during_index_growth_keeps_old_table() {
    let store = TempStore::new();
    let paths: StorePaths = store.paths();
    let switch = CrashSwitch::new();
    {
        let backend = FileBackend::open(&paths.index).unwrap();
        let index = DurableHashMap::open(
            Box::new(CrashableBackend::new(Box::new(backend), switch.clone())),
            16,
        )
        .unwrap();
        for raw in 1..=8u32 {
            index.put(raw as i32 * 101, Id::new(raw)).unwrap();
        }
        // The ninth insert doubles the table; die partway through the copy.
        switch.crash_after(40);
        assert!(index.put(909, Id::new(9)).is_err());
        assert!(switch.has_crashed());
    }

    let index = DurableHashMap::open_file(&paths.index, 16).unwrap();
    assert_eq!(index.len(), 8);
    assert_eq!(index.capacity(), 16);
    for raw in 1..=8u32 {
        assert_eq!(
            index.lookup(raw as i32 * 101, &mut |_| Ok(true)).unwrap(),
            Some(Id::new(raw))
        );
    }
    index.put(909, Id::new(9)).unwrap();
    assert_eq!(index.capacity(), 32);
}

#[test]
fn crash_between_log_append_and_index_insert() {
    let store = TempStore::new();
    {
        let names = store.open();
        names.enumerate(&s("alpha")).unwrap();
        names.close().unwrap();
    }
    {
        let backend = FileBackend::open(store.base()).unwrap();
        let log = AppendLog::open(Box::new(backend), false).unwrap();
        log.append(b"beta").unwrap();
        log.close().unwrap();
    }

    let names = store.open();
    assert_eq!(names.try_enumerate(&s("beta")).unwrap(), Some(Id::new(2)));
    assert_eq!(names.enumerate(&s("beta")).unwrap(), Id::new(2));
    assert_eq!(names.len(), 2);
}

#[test]
fn crash_during_log_append_is_invisible_after_reopen() {
    let store = TempStore::new();
    let switch = CrashSwitch::new();
    {
        let backend = FileBackend::open(store.base()).unwrap();
        let log = AppendLog::open(
            Box::new(CrashableBackend::new(Box::new(backend), switch.clone())),
            false,
        )
        .unwrap();
        log.set_data_version(1).unwrap();
        log.append(b"alpha").unwrap();
        switch.crash_after(5);
        assert!(log.append(b"a long second key").is_err());
    }

    let names = store.open();
    assert_eq!(names.len(), 1);
    assert_eq!(names.value_of(Id::new(1)).unwrap(), Some(s("alpha")));
}

#[test]
fn lost_appends_then_unindexed_append() {
    let store = TempStore::new();
    {
        let names = store.open();
        for key in ["a", "b", "c"] {
            names.enumerate(&s(key)).unwrap();
        }
        names.close().unwrap();
    }
    // The log loses "b" and "c"; the index still has them.
    tear_tail(store.base(), 2 * (FRAME_HEADER_LEN as u64 + 1)).unwrap();
    {
        let names = store.open();
        assert_eq!(names.len(), 1);
        assert_eq!(names.try_enumerate(&s("b")).unwrap(), None);
        assert_eq!(names.enumerate(&s("x")).unwrap(), Id::new(2));
        names.close().unwrap();
    }
    // "y" reaches the log but not the index.
    {
        let backend = FileBackend::open(store.base()).unwrap();
        let log = AppendLog::open(Box::new(backend), false).unwrap();
        assert_eq!(log.append(b"y").unwrap(), Id::new(3));
        log.close().unwrap();
    }

    let names = store.open();
    assert_eq!(names.try_enumerate(&s("y")).unwrap(), Some(Id::new(3)));
    assert_eq!(names.enumerate(&s("y")).unwrap(), Id::new(3));
    assert_eq!(names.try_enumerate(&s("a")).unwrap(), Some(Id::new(1)));
    assert_eq!(names.try_enumerate(&s("x")).unwrap(), Some(Id::new(2)));
    assert_eq!(names.try_enumerate(&s("c")).unwrap(), None);
    assert_eq!(names.len(), 3);
}

#[test]
fn enumerator_keeps_working_after_failed_writes() {
    let store = TempStore::new();
    let switch = CrashSwitch::new();
    let assigned: Vec<(String, Id)> = {
        let backend = FileBackend::open(store.base()).unwrap();
        let log = AppendLog::open(
            Box::new(CrashableBackend::new(Box::new(backend), switch.clone())),
            true,
        )
        .unwrap();
        let index = DurableHashMap::open_file(&store.paths().index, 16).unwrap();
        let names =
            DurableEnumerator::from_parts(Box::new(log), Box::new(index), StringCodec, true)
                .unwrap();

        let mut assigned = vec![(s("a"), names.enumerate(&s("a")).unwrap())];

        switch.fail_next_sync();
        assert!(names.enumerate(&s("b")).is_err());
        assigned.push((s("c"), names.enumerate(&s("c")).unwrap()));

        switch.fail_next_write();
        assert!(names.enumerate(&s("a key long enough to tear")).is_err());
        assigned.push((s("e"), names.enumerate(&s("e")).unwrap()));
        assigned.push((s("b"), names.enumerate(&s("b")).unwrap()));

        for (key, id) in &assigned {
            assert_eq!(names.value_of(*id).unwrap().as_ref(), Some(key));
        }
        names.close().unwrap();
        assigned
    };
    assert!(!switch.has_crashed());

    let ids: Vec<Id> = assigned.iter().map(|(_, id)| *id).collect();
    assert_eq!(ids, [Id::new(1), Id::new(2), Id::new(3), Id::new(4)]);

    let names = store.open();
    assert_eq!(names.len(), 4);
    for (key, id) in &assigned {
        assert_eq!(names.try_enumerate(key).unwrap(), Some(*id));
        assert_eq!(names.value_of(*id).unwrap().as_ref(), Some(key));
    }
    assert_eq!(
        names.try_enumerate(&s("a key long enough to tear")).unwrap(),
        None
    );
}
