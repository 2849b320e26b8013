use scraper::{ElementRef, Selector};

/// Compiles a selector literal. Only used with selectors written in this crate.
pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|err| panic!("invalid selector {css:?}: {err:?}"))
}

/// Compiles a list of fallback selectors, tried in order.
pub(crate) fn selectors(css: &[&str]) -> Vec<Selector> {
    css.iter().map(|s| selector(s)).collect()
}

/// Trimmed text content of an element.
pub(crate) fn text_of(element: ElementRef) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Every text node trimmed, empty ones dropped, the rest concatenated.
pub(crate) fn stripped_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

/// First match of the first selector in `fallbacks` that matches anything.
pub(crate) fn select_first<'a>(
    scope: ElementRef<'a>,
    fallbacks: &[Selector],
) -> Option<ElementRef<'a>> {
    fallbacks.iter().find_map(|sel| scope.select(sel).next())
}
