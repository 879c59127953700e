/// Displays and formats a chain of errors connected via their `source` attribute.
pub fn display_chain(mut err: &dyn std::error::Error) -> String {
    let mut fmt = err.to_string();
    while let Some(source) = err.source() {
        fmt = format!("{fmt}: {source}");
        err = source;
    }

    fmt
}

#[cfg(test)]
mod tests {
    use storefront_catalog::CatalogClientError;

    use super::*;

    #[test]
    fn chain_joins_sources() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err = CatalogClientError::InvalidUrl("not a url".to_string(), parse_err);
        assert_eq!(
            display_chain(&err),
            "invalid catalog url 'not a url': relative URL without a base"
        );
    }
}
