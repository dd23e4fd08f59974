use smallvec::SmallVec;

use crate::ast::{Helper, Node, Resource};

/// Collects the runtime helpers the generated procedure has to bind.
#[derive(Debug, Default)]
struct Transformer {
    helpers: SmallVec<[Helper; 6]>,
}

impl Transformer {
    fn helper(&mut self, helper: Helper) {
        if !self.helpers.contains(&helper) {
            self.helpers.push(helper);
        }
    }

    fn traverse(&mut self, node: &Node) {
        match node {
            Node::Plural(plural) => {
                for case in &plural.cases {
                    self.traverse_nodes(&case.items);
                }
                self.helper(Helper::Plural);
            }
            Node::Message(message) => self.traverse_nodes(&message.items),
            Node::Linked(linked) => {
                self.traverse(&linked.key);
                self.helper(Helper::Linked);
            }
            Node::List(_) => {
                self.helper(Helper::Interpolate);
                self.helper(Helper::List);
            }
            Node::Named(_) => {
                self.helper(Helper::Interpolate);
                self.helper(Helper::Named);
            }
            Node::Resource(_)
            | Node::Text(_)
            | Node::Literal(_)
            | Node::LinkedKey(_)
            | Node::LinkedModifier(_) => {}
        }
    }

    fn traverse_nodes(&mut self, nodes: &[Node]) {
        for node in nodes {
            self.traverse(node);
        }
    }
}

/// Records on `resource` the deduplicated helper names in first-use order.
/// `normalize` is always first.
pub fn transform(resource: &mut Resource) {
    let mut transformer = Transformer::default();
    transformer.helper(Helper::Normalize);
    transformer.traverse(&resource.body);
    resource.helpers = transformer.helpers.into_vec();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Parser, ParserOptions};
    use crate::error::Diagnostics;
    use rstest::rstest;

    #[rstest]
    #[case::text("hello", vec![Helper::Normalize])]
    #[case::list("hi {0}", vec![Helper::Normalize, Helper::Interpolate, Helper::List])]
    #[case::named_and_list("{name} {0} {other}", vec![Helper::Normalize, Helper::Interpolate, Helper::Named, Helper::List])]
    #[case::plural("a | {n} b", vec![Helper::Normalize, Helper::Interpolate, Helper::Named, Helper::Plural])]
    #[case::linked("@:foo", vec![Helper::Normalize, Helper::Linked])]
    #[case::linked_named("@:{key}", vec![Helper::Normalize, Helper::Interpolate, Helper::Named, Helper::Linked])]
    fn test_transform(#[case] source: &str, #[case] expected: Vec<Helper>) {
        let mut resource = Parser::new(ParserOptions::default(), Diagnostics::default())
            .parse(source)
            .unwrap();
        transform(&mut resource);
        assert_eq!(resource.helpers, expected);
    }
}
