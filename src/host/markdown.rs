use markdown::mdast::Node;
use markdown::ParseOptions;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Code { lang: Option<String>, value: String },
    Paragraph(String),
    Heading { depth: u8, text: String },
    Other(String),
}

impl Block {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Code { .. } => "pre",
            Self::Paragraph(_) => "p",
            Self::Heading { depth, .. } => match depth {
                1 => "h1",
                2 => "h2",
                3 => "h3",
                4 => "h4",
                5 => "h5",
                _ => "h6",
            },
            Self::Other(_) => "div",
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Self::Code { value, .. } => value,
            Self::Paragraph(text) | Self::Other(text) => text,
            Self::Heading { text, .. } => text,
        }
    }
}

// Parses `text` as CommonMark. An unclosed fence runs to the end of the
// text, so a code block keeps its position while it is being streamed.
pub fn blocks(text: &str) -> Vec<Block> {
    let root = match markdown::to_mdast(text, &ParseOptions::default()) {
        Ok(root) => root,
        Err(err) => {
            debug!(%err, "markdown parse failed, showing raw text");
            return vec![Block::Paragraph(text.to_string())];
        }
    };

    let Some(children) = root.children() else {
        return Vec::new();
    };
    children.iter().filter_map(block).collect()
}

fn block(node: &Node) -> Option<Block> {
    let block = match node {
        Node::Code(code) => Block::Code {
            lang: code.lang.clone().filter(|lang| !lang.is_empty()),
            value: code.value.clone(),
        },
        Node::Paragraph(_) => Block::Paragraph(node.to_string()),
        Node::Heading(heading) => Block::Heading {
            depth: heading.depth,
            text: node.to_string(),
        },
        other => {
            let text = other.to_string();
            if text.trim().is_empty() {
                return None;
            }
            Block::Other(text)
        }
    };
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_code_keeps_its_info_string() {
        let parsed = blocks("Status:\n\n```TaskManager\n{\"followers\": 12}\n```\n");
        assert_eq!(
            parsed,
            vec![
                Block::Paragraph("Status:".to_string()),
                Block::Code {
                    lang: Some("TaskManager".to_string()),
                    value: "{\"followers\": 12}".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unclosed_fence_is_still_a_code_block() {
        let parsed = blocks("```TaskManager\n{\"followers\": 1");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].tag(), "pre");
        assert_eq!(parsed[0].text(), "{\"followers\": 1");
    }

    #[test]
    fn headings_carry_their_depth() {
        let parsed = blocks("## Day two");
        assert_eq!(parsed[0].tag(), "h2");
        assert_eq!(parsed[0].text(), "Day two");
    }
}
