//! End-to-end regeneration scenarios against a temporary output tree.

use std::fs;
use std::path::{Path, PathBuf};

use repogen_lib::existing::interface_method_names;
use repogen_lib::planner::Catalogue;
use repogen_lib::{PluginRequest, RawField, RawStruct, handle_request, write_all_or_nothing};
use tempfile::TempDir;

const CUSTOM_SEARCH: &str = "/// Finds videos whose title matches exactly.\n    async fn custom_search(&self, title: String) -> MongoResult<Vec<video::Video>>;";

fn video(methods: &[&str]) -> RawStruct {
    RawStruct {
        name: "Video".into(),
        package: "video".into(),
        model_import: None,
        fields: vec![
            RawField {
                name: "id".into(),
                ty: "i64".into(),
                tag: String::new(),
            },
            RawField {
                name: "title".into(),
                ty: "String".into(),
                tag: "index=true".into(),
            },
        ],
        methods: methods.iter().map(|m| m.to_string()).collect(),
    }
}

fn request(dir: &Path, structs: Vec<RawStruct>) -> PluginRequest {
    PluginRequest {
        parameters: vec![format!("out_dir={}", dir.display())],
        structs,
    }
}

/// Runs one generation and writes its output, like the CLI does.
fn generate(dir: &Path, structs: Vec<RawStruct>) {
    let response = handle_request(&request(dir, structs));
    assert_eq!(response.error, None);
    write_all_or_nothing(&response.contents).unwrap();
}

fn implementation(dir: &Path) -> PathBuf {
    dir.join("dao/video/video_repo_mongo.rs")
}

fn interface(dir: &Path) -> PathBuf {
    dir.join("dao/video/video_repo_doc.rs")
}

/// Inserts `lines` just before the closing brace of the interface trait.
fn add_to_trait(doc: &str, lines: &str) -> String {
    let open = doc.find("pub trait VideoRepository {").unwrap();
    let close = open + doc[open..].find("\n}\n").unwrap() + 1;
    let mut edited = doc.to_string();
    edited.insert_str(close, lines);
    edited
}

fn catalogue_names() -> Vec<String> {
    Catalogue::standard().names().map(String::from).collect()
}

fn sorted(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names
}

fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        if path.is_dir() {
            found.extend(files_under(&path));
        } else {
            found.push(path);
        }
    }
    found
}

// === fresh generation ===

#[test]
fn video_on_empty_tree_produces_exactly_two_files() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);

    let mut files = files_under(dir.path());
    files.sort();
    assert_eq!(files, vec![interface(dir.path()), implementation(dir.path())]);

    let implementation_text = fs::read_to_string(implementation(dir.path())).unwrap();
    let interface_text = fs::read_to_string(interface(dir.path())).unwrap();
    for name in catalogue_names() {
        assert!(implementation_text.contains(&format!("pub async fn {name}(")), "impl missing {name}");
        assert!(interface_text.contains(&format!("async fn {name}(")), "trait missing {name}");
    }

    syn::parse_file(&implementation_text).unwrap();
    syn::parse_file(&interface_text).unwrap();
    assert!(implementation_text.contains("pub fn index_models() -> Vec<IndexModel>"));
}

#[test]
fn fresh_interface_lists_catalogue_and_declared_methods() {
    let dir = TempDir::new().unwrap();
    generate(
        dir.path(),
        vec![video(&["async fn by_title(&self, title: String) -> MongoResult<Vec<video::Video>>;"])],
    );

    let names = interface_method_names(&fs::read_to_string(interface(dir.path())).unwrap()).unwrap();
    let mut expected = catalogue_names();
    expected.push("by_title".into());
    assert_eq!(names, expected);

    let implementation_text = fs::read_to_string(implementation(dir.path())).unwrap();
    assert!(implementation_text.contains("by_title is not implemented yet"));
}

#[test]
fn package_and_name_map_to_snake_case_paths() {
    let dir = TempDir::new().unwrap();
    let mut raw = video(&[]);
    raw.name = "UserVideo".into();
    raw.package = "VideoCenter".into();
    generate(dir.path(), vec![raw]);

    assert!(dir.path().join("dao/video_center/user_video_repo_mongo.rs").is_file());
    assert!(dir.path().join("dao/video_center/user_video_repo_doc.rs").is_file());
}

// === update generation ===

#[test]
fn update_is_idempotent_on_method_names() {
    let dir = TempDir::new().unwrap();
    let declared = ["async fn by_title(&self, title: String) -> MongoResult<u64>;"];

    generate(dir.path(), vec![video(&declared)]);
    let first = interface_method_names(&fs::read_to_string(interface(dir.path())).unwrap()).unwrap();

    generate(dir.path(), vec![video(&declared)]);
    let second_text = fs::read_to_string(interface(dir.path())).unwrap();
    let second = interface_method_names(&second_text).unwrap();

    generate(dir.path(), vec![video(&declared)]);
    let third_text = fs::read_to_string(interface(dir.path())).unwrap();
    let third = interface_method_names(&third_text).unwrap();

    assert_eq!(sorted(first.clone()), sorted(second.clone()));
    assert_eq!(second, third);
    assert_eq!(second_text, third_text);

    let implementation_text = fs::read_to_string(implementation(dir.path())).unwrap();
    assert_eq!(implementation_text.matches("pub async fn find_one(").count(), 1);
    assert_eq!(implementation_text.matches("pub async fn by_title(").count(), 1);
}

#[test]
fn manual_method_survives_regeneration_byte_for_byte() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);

    // A developer adds `custom_search` to both files.
    let doc_path = interface(dir.path());
    let doc = fs::read_to_string(&doc_path).unwrap();
    fs::write(&doc_path, add_to_trait(&doc, &format!("    {CUSTOM_SEARCH}\n"))).unwrap();

    let impl_path = implementation(dir.path());
    let mut implementation_text = fs::read_to_string(&impl_path).unwrap();
    implementation_text.push_str(
        "\nimpl VideoRepoMongo {\n    pub async fn custom_search(&self, title: String) -> MongoResult<Vec<video::Video>> {\n        self.find_list(doc! { \"title\": title }).await\n    }\n}\n",
    );
    fs::write(&impl_path, implementation_text).unwrap();

    generate(dir.path(), vec![video(&[])]);

    let doc = fs::read_to_string(&doc_path).unwrap();
    assert_eq!(doc.matches(CUSTOM_SEARCH).count(), 1);

    let names = interface_method_names(&doc).unwrap();
    let mut expected = catalogue_names();
    expected.push("custom_search".into());
    assert_eq!(names, expected);

    let implementation_text = fs::read_to_string(&impl_path).unwrap();
    assert_eq!(implementation_text.matches("pub async fn custom_search(").count(), 1);
    assert_eq!(implementation_text.matches("pub async fn count(").count(), 1);
    assert!(doc.contains("Self::custom_search(self, title).await"));
}

#[test]
fn hand_written_comments_and_layout_survive_update() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);

    let carried = "// used by the admin UI\n    async fn custom_search( &self,title:String )->MongoResult<Vec<video::Video>>; // odd spacing on purpose";
    let doc_path = interface(dir.path());
    let doc = fs::read_to_string(&doc_path).unwrap();
    fs::write(&doc_path, add_to_trait(&doc, &format!("\n    {carried}\n"))).unwrap();

    let impl_path = implementation(dir.path());
    let mut before = fs::read_to_string(&impl_path).unwrap();
    before = before.replacen(
        "pub fn new_video_repository(",
        "// tuned by hand\npub fn new_video_repository(",
        1,
    );
    before.push_str(
        "\nimpl VideoRepoMongo {\n    pub async fn custom_search(&self, title: String) -> MongoResult<Vec<video::Video>> {\n        // NOTE: matching is case sensitive, see ticket 42\n        self.find_list(doc! { \"title\": title }).await\n    }\n}\n",
    );
    fs::write(&impl_path, &before).unwrap();

    // a newly declared method forces an append to the implementation
    generate(
        dir.path(),
        vec![video(&["async fn by_title(&self, title: String) -> MongoResult<u64>;"])],
    );

    let after = fs::read_to_string(&impl_path).unwrap();
    assert!(after.starts_with(before.trim_end()), "previous implementation text changed");
    assert!(after.contains("// NOTE: matching is case sensitive, see ticket 42"));
    assert!(after.contains("// tuned by hand"));
    assert_eq!(after.matches("pub async fn by_title(").count(), 1);

    let doc = fs::read_to_string(&doc_path).unwrap();
    assert_eq!(doc.matches(carried).count(), 1);
    let names = interface_method_names(&doc).unwrap();
    assert_eq!(&names[12..], ["custom_search", "by_title"]);
    syn::parse_file(&doc).unwrap();
    syn::parse_file(&after).unwrap();
}

#[test]
fn reordered_imports_are_not_inserted_again() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);

    let impl_path = implementation(dir.path());
    let text = fs::read_to_string(&impl_path).unwrap();
    let merged = text
        .replacen("use mongodb::bson::Document;\n", "", 1)
        .replacen("use mongodb::bson::doc;", "use mongodb::bson::{Document, doc};", 1);
    fs::write(&impl_path, &merged).unwrap();

    generate(dir.path(), vec![video(&["async fn by_title(&self) -> MongoResult<u64>;"])]);

    let after = fs::read_to_string(&impl_path).unwrap();
    assert!(after.starts_with(merged.trim_end()));
    assert_eq!(after.matches("use mongodb::bson::").count(), 1);
}

#[test]
fn newly_declared_method_is_appended_on_update() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);
    generate(
        dir.path(),
        vec![video(&["async fn by_title(&self, title: String) -> MongoResult<u64>;"])],
    );

    let names = interface_method_names(&fs::read_to_string(interface(dir.path())).unwrap()).unwrap();
    assert_eq!(names.last().map(String::as_str), Some("by_title"));

    let implementation_text = fs::read_to_string(implementation(dir.path())).unwrap();
    assert_eq!(implementation_text.matches("pub async fn by_title(").count(), 1);
    assert_eq!(implementation_text.matches("pub fn new_video_repository(").count(), 1);
}

#[test]
fn broken_previous_interface_aborts_without_writing() {
    let dir = TempDir::new().unwrap();
    generate(dir.path(), vec![video(&[])]);
    fs::write(interface(dir.path()), "pub trait VideoRepository {").unwrap();
    let before = fs::read_to_string(implementation(dir.path())).unwrap();

    let response = handle_request(&request(dir.path(), vec![video(&[])]));
    assert!(response.contents.is_empty());
    assert!(response.error.unwrap().contains("struct Video"));
    assert_eq!(fs::read_to_string(implementation(dir.path())).unwrap(), before);
}

#[test]
fn module_that_is_not_a_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut request = request(dir.path(), vec![video(&[])]);
    request.parameters.push("module=my-app".into());

    let response = handle_request(&request);
    assert!(response.contents.is_empty());
    assert!(response.error.unwrap().contains("expects a Rust path"));
}

#[test]
fn rustfmt_backend_when_available() {
    if which::which("rustfmt").is_err() {
        return;
    }
    let dir = TempDir::new().unwrap();
    let mut request = request(dir.path(), vec![video(&[])]);
    request.parameters.push("formatter=rustfmt".into());

    let response = handle_request(&request);
    assert_eq!(response.error, None);
    let names = interface_method_names(&response.contents[1].content).unwrap();
    assert_eq!(names, catalogue_names());
}

#[test]
fn rustfmt_formatted_files_regenerate_cleanly() {
    let Ok(rustfmt) = which::which("rustfmt") else {
        return;
    };
    let dir = TempDir::new().unwrap();
    let run = |methods: &[&str]| {
        let mut request = request(dir.path(), vec![video(methods)]);
        request.parameters.push("formatter=rustfmt".into());
        let response = handle_request(&request);
        assert_eq!(response.error, None);
        write_all_or_nothing(&response.contents).unwrap();
    };

    run(&[]);
    // the developer formats the generated tree with their own rustfmt
    for path in [implementation(dir.path()), interface(dir.path())] {
        let status = std::process::Command::new(&rustfmt)
            .args(["--edition", "2024"])
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());
    }
    let formatted = fs::read_to_string(implementation(dir.path())).unwrap();

    run(&[]);
    run(&[]);

    let implementation_text = fs::read_to_string(implementation(dir.path())).unwrap();
    assert_eq!(implementation_text, formatted);
    let interface_text = fs::read_to_string(interface(dir.path())).unwrap();
    assert_eq!(interface_text.matches("use mongodb::bson::Document;").count(), 1);
    assert_eq!(interface_text.matches("use crate::model::video;").count(), 1);
    syn::parse_file(&interface_text).unwrap();
}
