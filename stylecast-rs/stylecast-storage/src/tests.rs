use super::*;
use stylecast_core::ComposedPrompt;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

fn unique_temp_dir() -> PathBuf {
    static COUNTER: AtomicUsize = AtomicUsize::new(0);
    let base = std::env::temp_dir();
    let id = format!(
        "stylecast-storage-test-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let dir = base.join(id);
    fs::create_dir_all(&dir).expect("create temp directory");
    dir
}

#[test]
fn guide_round_trips_byte_for_byte() {
    let dir = unique_temp_dir();
    let store = GuideStore::new(&dir);
    let body = "# Turner\n\n## Mood\nStormy, luminous.  \n\n\n";
    let guide = StyleGuide::new("j_m_w_turner", body);

    let path = store
        .write(&guide, WriteMode::KeepExisting)
        .expect("write guide");
    assert_eq!(path, dir.join("j_m_w_turner.md"));
    assert_eq!(fs::read(&path).expect("read guide"), body.as_bytes());

    let loaded = read_style_guide(&path).expect("load guide");
    assert_eq!(loaded.slug(), "j_m_w_turner");
    assert_eq!(loaded.body(), body);

    let prompt =
        ComposedPrompt::new(loaded.body(), "A lighthouse at dusk").expect("compose prompt");
    assert!(prompt.as_str().starts_with("A lighthouse at dusk"));
    assert!(prompt.as_str().ends_with(body));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn existing_guide_is_not_overwritten() {
    let dir = unique_temp_dir();
    let store = GuideStore::new(&dir);
    let first = StyleGuide::new("cubism", "# First\n");
    let second = StyleGuide::new("cubism", "# Second\n");

    let first_path = store.write(&first, WriteMode::default()).expect("first write");
    let second_path = store.write(&second, WriteMode::default()).expect("second write");

    assert_ne!(first_path, second_path);
    assert_eq!(fs::read_to_string(&first_path).expect("read first"), "# First\n");
    assert_eq!(fs::read_to_string(&second_path).expect("read second"), "# Second\n");

    let name = second_path
        .file_name()
        .and_then(|name| name.to_str())
        .expect("utf-8 file name");
    assert!(name.starts_with("cubism-"));
    assert!(name.ends_with(".md"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn overwrite_mode_replaces_existing_guide() {
    let dir = unique_temp_dir();
    let store = GuideStore::new(&dir);

    store
        .write(&StyleGuide::new("bauhaus", "old"), WriteMode::Overwrite)
        .expect("first write");
    let path = store
        .write(&StyleGuide::new("bauhaus", "new"), WriteMode::Overwrite)
        .expect("second write");

    assert_eq!(path, dir.join("bauhaus.md"));
    assert_eq!(fs::read_to_string(&path).expect("read guide"), "new");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn missing_guide_is_reported() {
    let dir = unique_temp_dir();
    let path = dir.join("absent.md");

    let error = read_style_guide(&path).expect_err("missing guide");
    assert!(matches!(error, StorageError::GuideNotFound { path: missing } if missing == path));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn saves_image_to_specified_directory() {
    let dir = unique_temp_dir();
    let options = SaveImageOptions {
        file_stem: "custom-name",
        mime_type: Some("image/jpeg"),
        output_dir: &dir,
    };

    let path = save_image(b"hello", options).expect("save image succeeds");
    assert_eq!(path, dir.join("custom-name.jpg"));
    assert_eq!(fs::read(&path).expect("read saved image"), b"hello");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn extension_falls_back_to_sniffed_format() {
    let dir = unique_temp_dir();
    let options = SaveImageOptions {
        file_stem: "sniffed",
        mime_type: None,
        output_dir: &dir,
    };

    let path = save_image(PNG_BYTES, options).expect("save image succeeds");
    assert_eq!(path, dir.join("sniffed.png"));

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn image_directory_names_files_after_prompt_and_index() {
    let dir = unique_temp_dir();
    let names = ImageNameContext::from_prompt("A lighthouse in a storm");
    let images = ImageDirectory::new(&dir, names);
    let artifact = ImageArtifact {
        bytes: PNG_BYTES.to_vec(),
        media_type: Some("image/png".to_string()),
    };

    let first = images.store(1, &artifact).expect("store first");
    let second = images.store(2, &artifact).expect("store second");

    let first_name = first.file_name().and_then(|n| n.to_str()).expect("name");
    let second_name = second.file_name().and_then(|n| n.to_str()).expect("name");
    assert!(first_name.starts_with("a_lighthouse_in_a_storm-p1-"));
    assert!(second_name.starts_with("a_lighthouse_in_a_storm-p2-"));
    assert!(first_name.ends_with(".png"));
    assert_eq!(fs::read(&first).expect("read image"), PNG_BYTES);

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn empty_payload_is_rejected() {
    let dir = unique_temp_dir();
    let options = SaveImageOptions {
        file_stem: "empty",
        mime_type: Some("image/png"),
        output_dir: &dir,
    };

    let error = save_image(&[], options).expect_err("empty payload");
    assert!(matches!(error, StorageError::EmptyPayload));
    assert!(!dir.join("empty.png").exists());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn unknown_mime_types_use_generic_extension() {
    assert_eq!(extension_from_mime(Some("image/PNG")), "png");
    assert_eq!(extension_from_mime(Some("image/jpg")), "jpg");
    assert_eq!(extension_from_mime(Some("application/x-foo")), "bin");
    assert_eq!(extension_from_mime(None), "png");
}
