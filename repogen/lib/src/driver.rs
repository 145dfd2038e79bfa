//! Request-to-response orchestration.
//!
//! Structs are processed one after another. The first error aborts the
//! run and no files are returned, so callers never see a partial result.

use std::path::PathBuf;

use tracing::{debug, error, info, instrument};

use crate::args::Arguments;
use crate::error::{RepogenError, Result};
use crate::extract::Extractor;
use crate::imports::{ImportGroup, ImportTables, finalize};
use crate::model::{SchemaStruct, TypeExpr};
use crate::naming::{artifact_paths, implementation_module};
use crate::output::find_gen_dir;
use crate::planner::{Catalogue, Plan, plan};
use crate::render::format::{validate, with_notice};
use crate::render::{
    CanonicalFormatter, formatter_for, implementation_template, interface_template, repo_struct_name,
};
use crate::request::{GeneratedFile, PluginRequest, PluginResponse, RawStruct};

/// Holds the read-only tables and formatter for one run.
pub struct Generator {
    args: Arguments,
    catalogue: Catalogue,
    imports: ImportTables,
    formatter: Box<dyn CanonicalFormatter>,
}

impl Generator {
    /// Builds a generator, resolving `use_gen_dir` and the formatter backend.
    pub fn new(args: Arguments) -> Result<Self> {
        let formatter = formatter_for(args.formatter)?;
        Self::with_formatter(args, formatter)
    }

    pub fn with_formatter(mut args: Arguments, formatter: Box<dyn CanonicalFormatter>) -> Result<Self> {
        if args.use_gen_dir {
            let gen_dir = find_gen_dir(&args.out_dir)?;
            let relative = gen_dir
                .strip_prefix(&args.out_dir)
                .map(PathBuf::from)
                .map_err(|e| RepogenError::Argument(format!("generated directory: {e}")))?;
            debug!(dir = %relative.display(), "using generated directory for models and repositories");
            args.dao_dir = relative.clone();
            args.model_dir = relative;
        }

        Ok(Self {
            args,
            catalogue: Catalogue::standard(),
            imports: ImportTables::standard(),
            formatter,
        })
    }

    pub fn args(&self) -> &Arguments {
        &self.args
    }

    /// Generates the artifact pair of every struct, plus the base pair when
    /// `gen_base` is set.
    #[instrument(skip_all, fields(structs = structs.len()))]
    pub fn generate(&self, structs: &[RawStruct]) -> Result<Vec<GeneratedFile>> {
        let mut extractor = Extractor::new(&self.args, &self.catalogue);
        let mut files = Vec::with_capacity(structs.len() * 2 + 2);

        for raw in structs {
            let schema = extractor.extract(raw)?;
            let plan = plan(&schema, &self.catalogue);
            let models = ImportGroup::models(schema.model_import.as_deref());
            let repo = repo_import(&schema);
            let kept = kept_imports(&schema);

            let mut implementation_groups = vec![&self.imports.driver];
            if schema.indexed_fields().next().is_some() {
                implementation_groups.push(&self.imports.index);
            }
            implementation_groups.push(&models);
            let interface_groups = [&self.imports.interface, &models, &repo, &kept];

            files.extend(self.render_pair(&schema, &plan, &implementation_groups, &interface_groups)?);
            self.summarize(&schema, &plan);
        }

        if self.args.gen_base {
            let base = base_struct(&self.args);
            let plan = plan(&base, &self.catalogue);
            let models = ImportGroup::models(extractor.observed_imports().iter().map(String::as_str));
            let repo = repo_import(&base);
            let implementation_groups = [&self.imports.driver, &models, &self.imports.base];
            let interface_groups = [&self.imports.interface, &models, &self.imports.base, &repo];

            files.extend(self.render_pair(&base, &plan, &implementation_groups, &interface_groups)?);
            self.summarize(&base, &plan);
        }

        Ok(files)
    }

    fn render_pair(
        &self,
        schema: &SchemaStruct,
        plan: &Plan,
        implementation_groups: &[&ImportGroup],
        interface_groups: &[&ImportGroup],
    ) -> Result<[GeneratedFile; 2]> {
        let implementation_path = schema.paths.implementation.display().to_string();
        let interface_path = schema.paths.interface.display().to_string();

        let implementation = implementation_template(schema, plan)
            .compose(&implementation_path, self.formatter.as_ref())?;
        let interface = interface_template(schema, plan)?
            .compose(&interface_path, self.formatter.as_ref())?;

        let finish = |path: String, text: &str, groups: &[&ImportGroup]| -> Result<GeneratedFile> {
            let content = with_notice(&finalize(text, groups));
            validate(&path, &content)?;
            Ok(GeneratedFile { name: path, content })
        };
        Ok([
            finish(implementation_path, &implementation, implementation_groups)?,
            finish(interface_path, &interface, interface_groups)?,
        ])
    }

    fn summarize(&self, schema: &SchemaStruct, plan: &Plan) {
        let mode = if schema.is_update() { "update" } else { "new" };
        if self.args.verbose {
            info!(
                struct_name = %schema.name,
                mode,
                appended = plan.pending_operations.len() + plan.fresh.len(),
                carried = plan.carried.len(),
                "generated repository"
            );
        } else {
            debug!(struct_name = %schema.name, mode, "generated repository");
        }
    }
}

/// `use super::<name>_repo_mongo::<Name>RepoMongo;` for the trait impl in
/// the interface file.
fn repo_import(schema: &SchemaStruct) -> ImportGroup {
    ImportGroup::new(
        "repo",
        [format!(
            "use super::{}::{};",
            implementation_module(&schema.name),
            repo_struct_name(schema)
        )],
    )
}

/// Imports of the previous interface file, so carried methods keep the
/// names they refer to.
fn kept_imports(schema: &SchemaStruct) -> ImportGroup {
    let source = schema
        .previous
        .as_ref()
        .map_or("", |previous| previous.interface_source.as_str());
    ImportGroup::kept_from("kept", source)
}

/// The pseudo-struct behind the shared base repository.
fn base_struct(args: &Arguments) -> SchemaStruct {
    SchemaStruct {
        name: "Base".to_string(),
        package: "base".to_string(),
        model_import: None,
        model: TypeExpr::ident("BaseModel"),
        fields: Vec::new(),
        declared_methods: Vec::new(),
        paths: artifact_paths(&args.dao_root(), "base", "Base"),
        previous: None,
    }
}

/// Parses the parameters and generates every file for `request`.
pub fn run(request: &PluginRequest) -> Result<Vec<GeneratedFile>> {
    let args = Arguments::unpack(&request.parameters)?;
    Generator::new(args)?.generate(&request.structs)
}

/// Runs a request and folds any error into the response.
#[instrument(skip_all, fields(structs = request.structs.len()))]
pub fn handle_request(request: &PluginRequest) -> PluginResponse {
    match run(request) {
        Ok(contents) => {
            info!(files = contents.len(), "generation finished");
            PluginResponse {
                contents,
                error: None,
            }
        }
        Err(e) => {
            error!(error = %e, "generation failed");
            PluginResponse::failure(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::existing::interface_method_names;
    use crate::render::PrettyPleaseFormatter;
    use crate::request::RawField;

    fn video() -> RawStruct {
        RawStruct {
            name: "Video".into(),
            package: "video".into(),
            model_import: None,
            fields: vec![RawField {
                name: "title".into(),
                ty: "String".into(),
                tag: "index=true".into(),
            }],
            methods: Vec::new(),
        }
    }

    fn generator(dir: &TempDir, extra: &[&str]) -> Generator {
        let mut params = vec![format!("out_dir={}", dir.path().display())];
        params.extend(extra.iter().map(|s| s.to_string()));
        let args = Arguments::unpack(&params).unwrap();
        Generator::with_formatter(args, Box::new(PrettyPleaseFormatter)).unwrap()
    }

    #[test]
    fn generates_pair_with_imports_and_notice() {
        let dir = TempDir::new().unwrap();
        let files = generator(&dir, &[]).generate(&[video()]).unwrap();

        assert_eq!(files.len(), 2);
        assert!(files[0].name.ends_with("dao/video/video_repo_mongo.rs"));
        assert!(files[1].name.ends_with("dao/video/video_repo_doc.rs"));
        for file in &files {
            assert!(file.content.starts_with("// Code generated by repogen"));
            assert!(file.content.contains("use crate::model::video;"));
            syn::parse_file(&file.content).unwrap();
        }

        let implementation = &files[0].content;
        assert!(implementation.contains("use mongodb::Collection;"));
        assert!(implementation.contains("use mongodb::IndexModel;"));

        let interface = &files[1].content;
        assert!(interface.contains("use super::video_repo_mongo::VideoRepoMongo;"));
        assert!(interface.contains("impl VideoRepository for VideoRepoMongo {"));
        assert!(!interface.contains("TryStreamExt"));
        assert!(!interface.contains("IndexModel"));
    }

    #[test]
    fn index_imports_only_with_indexed_fields() {
        let dir = TempDir::new().unwrap();
        let mut plain = video();
        plain.fields[0].tag = String::new();

        let files = generator(&dir, &[]).generate(&[plain]).unwrap();
        assert!(!files[0].content.contains("IndexModel"));
        assert!(!files[0].content.contains("use mongodb::bson::doc;"));
    }

    #[test]
    fn trait_impl_covers_every_interface_method() {
        let dir = TempDir::new().unwrap();
        let mut raw = video();
        raw.methods = vec!["async fn by_title(&self, title: String) -> MongoResult<u64>;".into()];

        let files = generator(&dir, &[]).generate(&[raw]).unwrap();
        let interface = syn::parse_file(&files[1].content).unwrap();
        let trait_impl = interface
            .items
            .iter()
            .find_map(|item| match item {
                syn::Item::Impl(i) if i.trait_.is_some() => Some(i),
                _ => None,
            })
            .unwrap();

        let names: Vec<String> = trait_impl
            .items
            .iter()
            .filter_map(|item| match item {
                syn::ImplItem::Fn(f) => Some(f.sig.ident.to_string()),
                _ => None,
            })
            .collect();
        assert_eq!(names, interface_method_names(&files[1].content).unwrap());
        assert_eq!(names.len(), 13);
    }

    #[test]
    fn invalid_model_import_fails_the_run() {
        let dir = TempDir::new().unwrap();
        let mut raw = video();
        raw.model_import = Some("crate::my-models::video".into());

        let result = generator(&dir, &[]).generate(&[raw]);
        assert!(matches!(result, Err(RepogenError::Parse { .. })));
    }

    #[test]
    fn base_aliases_models_with_the_same_module_name() {
        let dir = TempDir::new().unwrap();
        let mut first = video();
        first.package = "a/video".into();
        let mut second = video();
        second.name = "Clip".into();
        second.package = "b/video".into();

        let files = generator(&dir, &["gen_base=true"])
            .generate(&[first, second])
            .unwrap();
        let base_doc = &files[5].content;
        assert!(base_doc.contains("use crate::model::a::video;"));
        assert!(base_doc.contains("use crate::model::b::video as b_video;"));
        syn::parse_file(base_doc).unwrap();
    }

    #[test]
    fn base_pair_collects_observed_imports() {
        let dir = TempDir::new().unwrap();
        let mut user = video();
        user.name = "User".into();
        user.package = "user".into();

        let files = generator(&dir, &["gen_base=true"])
            .generate(&[video(), user])
            .unwrap();
        assert_eq!(files.len(), 6);

        let base_doc = &files[5];
        assert!(base_doc.name.ends_with("dao/base/base_repo_doc.rs"));
        assert!(base_doc.content.contains("use crate::model::video;"));
        assert!(base_doc.content.contains("use crate::model::user;"));
        assert!(base_doc.content.contains("use mongodb::bson::Document as BaseModel;"));

        let names = interface_method_names(&base_doc.content).unwrap();
        assert_eq!(names.len(), 12);
        assert!(base_doc.content.contains("MongoResult<Vec<BaseModel>>"));
    }

    #[test]
    fn use_gen_dir_redirects_output_and_imports() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("generated")).unwrap();

        let files = generator(&dir, &["use_gen_dir=true"]).generate(&[video()]).unwrap();
        assert!(files[0].name.ends_with("generated/video/video_repo_mongo.rs"));
        assert!(files[0].content.contains("use crate::generated::video;"));
    }

    #[test]
    fn use_gen_dir_without_directory_fails() {
        let dir = TempDir::new().unwrap();
        let args = Arguments::unpack(&[
            format!("out_dir={}", dir.path().display()),
            "use_gen_dir=true".to_string(),
        ])
        .unwrap();
        assert!(matches!(
            Generator::with_formatter(args, Box::new(PrettyPleaseFormatter)),
            Err(RepogenError::Io { .. })
        ));
    }

    #[test]
    fn first_error_aborts_the_run() {
        let dir = TempDir::new().unwrap();
        let mut broken = video();
        broken.fields[0].tag = "nonsense=1".into();

        let result = generator(&dir, &[]).generate(&[video(), broken]);
        assert!(matches!(result, Err(RepogenError::Parse { .. })));
    }

    #[test]
    fn handle_request_reports_argument_errors() {
        let request = PluginRequest {
            parameters: vec!["bogus=1".into()],
            structs: vec![video()],
        };
        let response = handle_request(&request);
        assert!(response.contents.is_empty());
        assert!(response.error.unwrap().contains("unknown parameter 'bogus'"));
    }

    #[tracing_test::traced_test]
    #[test]
    fn failures_are_logged() {
        let request = PluginRequest {
            parameters: vec!["verbose=maybe".into()],
            structs: Vec::new(),
        };
        let response = handle_request(&request);
        assert!(response.error.is_some());
        assert!(logs_contain("generation failed"));
    }
}
