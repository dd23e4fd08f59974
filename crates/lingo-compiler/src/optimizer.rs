use crate::ast::{Message, Node, Resource, StaticText, Text, Literal};

/// Folds static text runs of each message into [`StaticText`].
#[derive(Debug, Default)]
pub struct Optimizer {
    folded: usize,
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages folded so far.
    pub fn folded(&self) -> usize {
        self.folded
    }

    pub fn optimize(&mut self, resource: &mut Resource) {
        match resource.body.as_mut() {
            Node::Plural(plural) => {
                for case in plural.cases.iter_mut() {
                    self.optimize_message(case);
                }
            }
            Node::Message(message) => self.optimize_message(message),
            _ => {}
        }
    }

    fn optimize_message(&mut self, message: &mut Message) {
        if message.static_text.is_some() || message.items.is_empty() {
            return;
        }

        let parts = message.items.iter().take_while(|item| item.is_static()).count();
        if parts == 0 {
            return;
        }

        let text: String = message.items[..parts]
            .iter()
            .filter_map(|item| item.static_value())
            .collect();

        if parts == message.items.len() {
            for item in message.items.iter_mut() {
                match item {
                    Node::Text(Text { value, .. }) | Node::Literal(Literal { value, .. }) => *value = None,
                    _ => {}
                }
            }
            message.static_text = Some(StaticText::Full(text));
        } else {
            message.static_text = Some(StaticText::Prefix { text, parts });
        }

        self.folded += 1;
    }
}

/// Optimizes `resource` in place.
pub fn optimize(resource: &mut Resource) {
    Optimizer::new().optimize(resource);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Parser, ParserOptions};
    use crate::error::Diagnostics;
    use rstest::rstest;

    fn parse(source: &str) -> Resource {
        Parser::new(ParserOptions::default(), Diagnostics::default())
            .parse(source)
            .unwrap()
    }

    fn static_texts(resource: &Resource) -> Vec<Option<StaticText>> {
        resource
            .messages()
            .into_iter()
            .map(|message| message.static_text.clone())
            .collect()
    }

    #[rstest]
    #[case::text("hello", vec![Some(StaticText::Full("hello".to_string()))])]
    #[case::text_and_literal("a{'{'}b", vec![Some(StaticText::Full("a{b".to_string()))])]
    #[case::prefix("hi {name}!", vec![Some(StaticText::Prefix { text: "hi ".to_string(), parts: 1 })])]
    #[case::trailing_only("{name} there", vec![None])]
    #[case::dynamic("{0}", vec![None])]
    #[case::plural("none | one {n} | many", vec![
        Some(StaticText::Full("none".to_string())),
        Some(StaticText::Prefix { text: "one ".to_string(), parts: 1 }),
        Some(StaticText::Full("many".to_string())),
    ])]
    fn test_optimize(#[case] source: &str, #[case] expected: Vec<Option<StaticText>>) {
        let mut resource = parse(source);
        optimize(&mut resource);
        assert_eq!(static_texts(&resource), expected);
    }

    #[test]
    fn test_full_static_drops_item_values() {
        let mut resource = parse("hello");
        optimize(&mut resource);

        let message = resource.messages()[0];
        assert_eq!(message.items.len(), 1);
        assert!(message.items.iter().all(|item| item.static_value().is_none()));
    }

    #[test]
    fn test_prefix_keeps_item_values() {
        let mut resource = parse("hi {name}");
        optimize(&mut resource);
        assert_eq!(resource.messages()[0].items[0].static_value(), Some("hi "));
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let mut resource = parse("a | b {n}");
        let mut optimizer = Optimizer::new();
        optimizer.optimize(&mut resource);
        let once = resource.clone();
        optimizer.optimize(&mut resource);

        assert_eq!(resource, once);
        assert_eq!(optimizer.folded(), 2);
    }
}
