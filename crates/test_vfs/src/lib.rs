pub use vfs::Vfs;

/// Builds an in-memory `Vfs` from `"path" => contents` pairs.
#[macro_export]
macro_rules! vfs_fixture(
    { $($path:expr => $contents:expr),+ $(,)? } => {
        {
            let fs = $crate::Vfs::new();
            $(
                fs.set($path, $contents);
            )+
            fs
        }
    };
);

#[macro_export]
macro_rules! map(
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut m = ::std::collections::HashMap::new();
            $(
                m.insert(String::from($key), $value);
            )+
            m
        }
    };
);

#[macro_export]
macro_rules! map2(
    { $($key:expr => $value:expr),+ $(,)? } => {
        {
            let mut m = ::std::collections::HashMap::new();
            $(
                m.insert($key, $value);
            )+
            m
        }
    };
);

#[macro_export]
macro_rules! set(
    { $($item:expr),+ $(,)? } => {
        {
            let mut m = ::std::collections::HashSet::new();
            $(
                m.insert($item);
            )+
            m
        }
    };
);
