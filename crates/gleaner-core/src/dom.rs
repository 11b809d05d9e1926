use scraper::{ElementRef, Selector};

use crate::error::AppError;

/// Compile a configured CSS selector, reporting which one is broken.
pub(crate) fn compile(selector: &str) -> Result<Selector, AppError> {
    Selector::parse(selector).map_err(|e| AppError::SelectorError {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Concatenated, trimmed text content of an element and its descendants.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// The first element sibling after `element`, skipping text and comments.
pub(crate) fn next_element_sibling(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element.next_siblings().find_map(ElementRef::wrap)
}

#[cfg(test)]
mod tests {
    use scraper::Html;

    use super::*;

    #[test]
    fn test_compile_rejects_bad_selector() {
        let err = compile("div[").unwrap_err();
        assert!(matches!(err, AppError::SelectorError { ref selector, .. } if selector == "div["));
    }

    #[test]
    fn test_text_of_trims_nested_text() {
        let doc = Html::parse_fragment("<div>  Hello <b>big</b> world \n</div>");
        let div = doc.select(&compile("div").unwrap()).next().unwrap();
        assert_eq!(text_of(div), "Hello big world");
    }

    #[test]
    fn test_next_element_sibling_skips_text() {
        let doc = Html::parse_fragment("<p><span>Make:</span> <!-- c --> <em>Kubota</em></p>");
        let span = doc.select(&compile("span").unwrap()).next().unwrap();
        let sibling = next_element_sibling(span).unwrap();
        assert_eq!(text_of(sibling), "Kubota");
    }
}
