pub mod extract;
pub mod substitute;

pub use extract::{scrape, FieldValues, HtmlDocument};
pub use substitute::{placeholders, same_placeholder, substitute};

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use extract::Document;
    use crate::store::{Selectors, Template};

    /// selectors → field values → filled-in template text
    fn build<D: Document>(template: &Template, doc: &D) -> (FieldValues, Result<String>) {
        let values = scrape(&template.selectors, doc);
        let text = substitute(&template.content, &values).into_text();
        (values, text)
    }

    fn template(content: &str, pairs: &[(&str, &str)]) -> Template {
        Template {
            name: "t".into(),
            content: content.into(),
            selectors: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<Selectors>(),
        }
    }

    #[test]
    fn product_page_fills_template() {
        let html = std::fs::read_to_string("tests/fixtures/product.html").unwrap();
        let doc = HtmlDocument::parse(&html);
        let t = template(
            "{{Title}} costs {{price}} ({{sku}}), sold by {{seller}}. {{stock}}",
            &[
                ("title", "h1"),
                ("price", ".price"),
                ("sku", "#sku b"),
                ("seller", ".seller-name"),
                ("stock", ".in-stock"),
            ],
        );
        let (values, text) = build(&t, &doc);
        assert_eq!(values.len(), 5);
        assert_eq!(
            text.unwrap(),
            "Walnut Desk Organizer costs $49.90 (WD-0042), sold by Oak & Co.. {{stock}}"
        );
    }

    #[test]
    fn nothing_found_is_an_error() {
        let doc = HtmlDocument::parse("<html><body><p>empty</p></body></html>");
        let t = template("Hi {{name}}", &[("name", ".user")]);
        let (_, text) = build(&t, &doc);
        assert!(matches!(text, Err(Error::Extraction)));
    }
}
