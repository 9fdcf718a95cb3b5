use notedeck::models::{CreateLabelRequest, CreateNoteRequest, NewUpload, UpdateNoteRequest};
use notedeck::{App, LabelFamily, StorageConfig};
use std::time::Duration;

fn open(root: &tempfile::TempDir) -> App {
    App::open(&StorageConfig::new(root.path())).with_hash_cost(4 /* bcrypt minimum cost */)
}

async fn work_label(app: &App) -> notedeck::models::Label {
    app.create_label(
        LabelFamily::Notes,
        CreateLabelRequest {
            name: "Work".to_string(),
            color: "#3b82f6".to_string(),
        },
    )
    .await
    .expect("work label")
}

#[tokio::test]
async fn deleting_a_label_strips_it_from_the_note() {
    let root = tempfile::tempdir().expect("temp root");
    let app = open(&root);
    let work = work_label(&app).await;

    let note = app
        .create_note(
            "user_a",
            CreateNoteRequest {
                title: "Standup notes".to_string(),
                content: "Yesterday / today / blockers".to_string(),
                label_ids: vec![work.id.clone()],
            },
        )
        .await
        .expect("note");
    assert_eq!(note.labels.len(), 1);
    assert_eq!(note.labels[0].id, work.id);
    assert_eq!(note.labels[0].name, "Work");
    assert_eq!(note.labels[0].color, "#3b82f6");

    let before = app.get_note("user_a", &note.id).await.expect("reload");
    tokio::time::sleep(Duration::from_millis(5)).await;
    app.delete_label(LabelFamily::Notes, &work.id).await.expect("delete label");

    let after = app.get_note("user_a", &note.id).await.expect("reload");
    assert!(after.labels.is_empty());
    assert!(after.updated_at > before.updated_at);
    assert_eq!(after.created_at, before.created_at);
    assert!(app.list_labels(LabelFamily::Notes).await.is_empty());
}

#[tokio::test]
async fn label_deletion_reaches_every_referencing_note() {
    let root = tempfile::tempdir().expect("temp root");
    let app = open(&root);
    let work = work_label(&app).await;

    let mut tagged = Vec::new();
    for (user, title) in [("user_a", "one"), ("user_a", "two"), ("user_b", "three")] {
        let note = app
            .create_note(
                user,
                CreateNoteRequest {
                    title: title.to_string(),
                    label_ids: vec![work.id.clone()],
                    ..CreateNoteRequest::default()
                },
            )
            .await
            .expect("note");
        tagged.push(note);
    }
    let plain = app
        .create_note(
            "user_a",
            CreateNoteRequest {
                title: "plain".to_string(),
                ..CreateNoteRequest::default()
            },
        )
        .await
        .expect("plain note");

    tokio::time::sleep(Duration::from_millis(5)).await;
    app.delete_label(LabelFamily::Notes, &work.id).await.expect("delete label");

    for note in &tagged {
        let reloaded = app.notes.find_by_id(&note.id).await.expect("still there");
        assert!(reloaded.labels.is_empty());
        assert!(reloaded.updated_at > note.updated_at);
    }
    let untouched = app.notes.find_by_id(&plain.id).await.expect("plain");
    assert_eq!(untouched.updated_at, plain.updated_at);
}

#[tokio::test]
async fn note_lifecycle_with_attachments() {
    let root = tempfile::tempdir().expect("temp root");
    let app = open(&root);

    let note = app
        .create_note(
            "user_a",
            CreateNoteRequest {
                title: "Receipts".to_string(),
                ..CreateNoteRequest::default()
            },
        )
        .await
        .expect("note");

    let mut paths = Vec::new();
    for name in ["a.txt", "b.png", "c"] {
        let stored = app
            .attach_to_note(
                "user_a",
                &note.id,
                NewUpload {
                    name: name.to_string(),
                    mime_type: "application/octet-stream".to_string(),
                    bytes: name.as_bytes().to_vec(),
                },
            )
            .await
            .expect("attach");
        let (_, path) = app.note_file("user_a", &note.id, &stored.id).await.expect("locate");
        assert!(path.exists());
        paths.push(path);
    }

    let renamed = app
        .update_note(
            "user_a",
            &note.id,
            UpdateNoteRequest {
                title: Some("Receipts 2025".to_string()),
                ..UpdateNoteRequest::default()
            },
        )
        .await
        .expect("update");
    assert_eq!(renamed.files.len(), 3);
    assert!(renamed.updated_at >= note.updated_at);

    app.delete_note("user_a", &note.id).await.expect("delete");
    for path in &paths {
        assert!(!path.exists(), "{} left behind", path.display());
    }
    assert!(app.list_notes("user_a").await.is_empty());
}
