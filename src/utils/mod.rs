pub mod naming;

pub use naming::{
    POLYMORPHIC_MARKER, pascal_case, resource_from_path, resource_from_url,
    strip_polymorphic_marker,
};
