use std::fs;

use localrag_core::types::DocumentDescriptor;
use localrag_corpus::fingerprint;

fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> String {
    let path = dir.path().join(name);
    fs::write(&path, body).unwrap();
    path.to_string_lossy().to_string()
}

#[test]
fn stable_and_order_independent() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let a = write(&tmp, "a.txt", "alpha");
    let b = write(&tmp, "b.txt", "beta");
    let forward = fingerprint(&[DocumentDescriptor::new(&a), DocumentDescriptor::new(&b)]);
    let again = fingerprint(&[DocumentDescriptor::new(&a), DocumentDescriptor::new(&b)]);
    let reversed = fingerprint(&[DocumentDescriptor::new(&b), DocumentDescriptor::new(&a)]);
    assert_eq!(forward, again);
    assert_eq!(forward, reversed);
    assert_eq!(forward.len(), 64);
    Ok(())
}

#[test]
fn same_content_under_new_temp_names_matches() -> anyhow::Result<()> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    let p1 = write(&first, "upload_1234.txt", "the same bytes");
    let p2 = write(&second, "upload_9876.txt", "the same bytes");
    assert_eq!(fingerprint(&[DocumentDescriptor::new(p1)]), fingerprint(&[DocumentDescriptor::new(p2)]));
    Ok(())
}

#[test]
fn swapped_contents_under_the_same_names_match() -> anyhow::Result<()> {
    let first = tempfile::tempdir()?;
    let second = tempfile::tempdir()?;
    let before = [write(&first, "tmp_a.txt", "content X"), write(&first, "tmp_b.txt", "content Y")];
    let after = [write(&second, "tmp_a.txt", "content Y"), write(&second, "tmp_b.txt", "content X")];
    assert_eq!(
        fingerprint(&before.map(DocumentDescriptor::new)),
        fingerprint(&after.map(DocumentDescriptor::new))
    );
    Ok(())
}

#[test]
fn one_byte_change_differs() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write(&tmp, "doc.txt", "version one");
    let before = fingerprint(&[DocumentDescriptor::new(&path)]);
    fs::write(&path, "version onE")?;
    let after = fingerprint(&[DocumentDescriptor::new(&path)]);
    assert_ne!(before, after);
    Ok(())
}

#[test]
fn enabled_flag_is_part_of_the_key() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let path = write(&tmp, "doc.txt", "content");
    assert_ne!(
        fingerprint(&[DocumentDescriptor::new(&path)]),
        fingerprint(&[DocumentDescriptor::disabled(&path)])
    );
    Ok(())
}

#[test]
fn urls_and_missing_files_use_their_path() {
    let url = "https://example.com/guide.html";
    assert_eq!(fingerprint(&[DocumentDescriptor::new(url)]), fingerprint(&[DocumentDescriptor::new(url)]));
    assert_ne!(
        fingerprint(&[DocumentDescriptor::new(url)]),
        fingerprint(&[DocumentDescriptor::new("https://example.com/other.html")])
    );
    assert_ne!(
        fingerprint(&[DocumentDescriptor::new("/no/such/file-a.txt")]),
        fingerprint(&[DocumentDescriptor::new("/no/such/file-b.txt")])
    );
}
