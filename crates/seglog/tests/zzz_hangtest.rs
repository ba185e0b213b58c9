use seglog::*;
use tempfile::tempdir;

#[test]
fn zzz_hang() {
    let dir = tempdir().unwrap();
    seglog::init(dir.path(), WriterOptions::new().with_pre_allocation_size(0)).unwrap();
    println!("init done");
    let mut reader = Reader::new(dir.path(), 0).unwrap();
    println!("reader created");
    assert!(!reader.next());
    println!("reader.next done");
    let writer = reader
        .into_writer(WriterOptions::new().with_sync_policy(SyncPolicy::Immediate))
        .unwrap();
    println!("writer created");
    writer.append_entry(b"foo").unwrap();
    println!("append foo");
    writer.append_entry(b"bar").unwrap();
    println!("append bar");
    writer.append_entry(b"baz").unwrap();
    println!("append baz");
    writer.close().unwrap();
    println!("closed");
}
