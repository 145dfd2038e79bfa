//! Deterministic mapping from schema names to file and module names.

use std::path::{Path, PathBuf};

use convert_case::{Case, Casing};

/// Suffix of the generated implementation file.
pub const IMPLEMENTATION_SUFFIX: &str = "_repo_mongo.rs";
/// Suffix of the generated interface file.
pub const INTERFACE_SUFFIX: &str = "_repo_doc.rs";

/// Converts a struct or package name into its snake_case path form.
///
/// A name containing `/` is already a path and is only lower-cased. A name
/// containing `\` keeps its final segment. Anything else is split on case
/// boundaries.
///
/// ## Examples
///
/// ```
/// use repogen_lib::naming::to_snake_name;
///
/// assert_eq!(to_snake_name("VideoService"), "video_service");
/// assert_eq!(to_snake_name("idl\\extract"), "extract");
/// assert_eq!(to_snake_name("a/b/C"), "a/b/c");
/// ```
pub fn to_snake_name(name: &str) -> String {
    if name.contains('/') {
        return name.to_lowercase();
    }
    if let Some((_, last)) = name.rsplit_once('\\') {
        return last.to_lowercase();
    }
    name.to_case(Case::Snake)
}

/// The two files generated for one struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub implementation: PathBuf,
    pub interface: PathBuf,
}

impl ArtifactPaths {
    /// Returns `true` when both files are present on disk.
    pub fn both_exist(&self) -> bool {
        self.implementation.is_file() && self.interface.is_file()
    }
}

/// Derives `<dao_root>/<package>/<name>_repo_{mongo,doc}.rs`.
pub fn artifact_paths(dao_root: &Path, package: &str, name: &str) -> ArtifactPaths {
    let dir = dao_root.join(to_snake_name(package));
    let stem = to_snake_name(name);
    ArtifactPaths {
        implementation: dir.join(format!("{stem}{IMPLEMENTATION_SUFFIX}")),
        interface: dir.join(format!("{stem}{INTERFACE_SUFFIX}")),
    }
}

/// Module name of the implementation file, e.g. `video_repo_mongo`.
pub fn implementation_module(name: &str) -> String {
    let suffix = IMPLEMENTATION_SUFFIX.trim_end_matches(".rs");
    format!("{}{suffix}", to_snake_name(name))
}

/// Last segment of a `::` separated module path.
pub fn module_alias(import_path: &str) -> &str {
    import_path
        .rsplit_once("::")
        .map_or(import_path, |(_, last)| last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_is_split() {
        assert_eq!(to_snake_name("VideoService"), "video_service");
        assert_eq!(to_snake_name("Video"), "video");
        assert_eq!(to_snake_name("video"), "video");
    }

    #[test]
    fn separators_short_circuit() {
        assert_eq!(to_snake_name("idl\\extract"), "extract");
        assert_eq!(to_snake_name("a/b/C"), "a/b/c");
        assert_eq!(to_snake_name("Idl/VideoService"), "idl/videoservice");
    }

    #[test]
    fn paths_follow_package_and_name() {
        let paths = artifact_paths(Path::new("out/dao"), "VideoCenter", "UserVideo");
        assert_eq!(
            paths.implementation,
            PathBuf::from("out/dao/video_center/user_video_repo_mongo.rs")
        );
        assert_eq!(
            paths.interface,
            PathBuf::from("out/dao/video_center/user_video_repo_doc.rs")
        );
    }

    #[test]
    fn both_exist_requires_both() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = artifact_paths(dir.path(), "video", "Video");
        assert!(!paths.both_exist());

        std::fs::create_dir_all(paths.interface.parent().unwrap()).unwrap();
        std::fs::write(&paths.interface, "").unwrap();
        assert!(!paths.both_exist());

        std::fs::write(&paths.implementation, "").unwrap();
        assert!(paths.both_exist());
    }

    #[test]
    fn implementation_module_matches_file_stem() {
        assert_eq!(implementation_module("UserVideo"), "user_video_repo_mongo");
        let paths = artifact_paths(Path::new("dao"), "video", "UserVideo");
        assert_eq!(
            paths.implementation.file_stem().unwrap(),
            implementation_module("UserVideo").as_str()
        );
    }

    #[test]
    fn module_alias_takes_last_segment() {
        assert_eq!(module_alias("crate::model::video"), "video");
        assert_eq!(module_alias("video"), "video");
    }
}
