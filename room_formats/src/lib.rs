pub mod popups;

pub use popups::{
    CatalogSource, Category, FALLBACK_NEGATIVE, FALLBACK_POSITIVE, Message, NEGATIVE_HEADER,
    POSITIVE_HEADER, ParsedCatalog, PopupCatalog,
};
