pub mod alias;
pub mod cdn;
pub mod external;
pub mod http;
pub mod tarball;
pub mod vfs_resolver;

use crate::config::BundleConfig;
use vfs::Vfs;

/// Probes the VFS for a candidate path: exact file first, configured
/// extensions for extensionless candidates, then `<candidate>/index.*`.
pub(crate) fn probe_vfs(fs: &Vfs, config: &BundleConfig, candidate: &str) -> Option<String> {
    if fs.exists(candidate) {
        return Some(vpath::normalize(candidate));
    }

    if vpath::extension(candidate).is_none() {
        for ext in config.probe_extensions() {
            let with_ext = format!("{}{}", candidate, ext);
            if fs.exists(&with_ext) {
                return Some(vpath::normalize(&with_ext));
            }
        }
    }

    for ext in config.probe_extensions() {
        let index = format!("{}/index{}", candidate, ext);
        if fs.exists(&index) {
            return Some(vpath::normalize(&index));
        }
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_vfs::vfs_fixture;

    #[test]
    fn test_probe_exact_then_extensions_then_index() {
        let fs = vfs_fixture!(
            "/a/exact.ts" => "1",
            "/a/mod.tsx" => "2",
            "/a/pkg/index.js" => "3"
        );
        let config = BundleConfig::default();

        assert_eq!(
            probe_vfs(&fs, &config, "/a/exact.ts"),
            Some("/a/exact.ts".to_string())
        );
        assert_eq!(
            probe_vfs(&fs, &config, "/a/mod"),
            Some("/a/mod.tsx".to_string())
        );
        assert_eq!(
            probe_vfs(&fs, &config, "/a/pkg"),
            Some("/a/pkg/index.js".to_string())
        );
        assert_eq!(probe_vfs(&fs, &config, "/a/missing"), None);
    }

    #[test]
    fn test_probe_respects_extension_order() {
        // ".tsx" is configured ahead of ".ts"
        let fs = vfs_fixture!(
            "/a/mod.ts" => "ts",
            "/a/mod.tsx" => "tsx"
        );
        let config = BundleConfig::default();
        assert_eq!(
            probe_vfs(&fs, &config, "/a/mod"),
            Some("/a/mod.tsx".to_string())
        );
    }
}
