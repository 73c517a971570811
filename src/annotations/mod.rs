pub mod index;

pub use index::{Annotation, AnnotationFeature, AnnotationIndex, AnnotationKind, AnnotationTile};
