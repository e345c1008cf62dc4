//! Token stream for the arena builder, produced by the html5ever tokenizer.
//! Never fails: malformed markup degrades to text, entities are decoded.

use html5ever::tendril::StrTendril;
use html5ever::tokenizer::states::RawKind;
use html5ever::tokenizer::{
    BufferQueue, Tag, TagKind, Token as HtmlToken, TokenSink, TokenSinkResult, Tokenizer,
    TokenizerOpts,
};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
}

/// Collects tokens, merging adjacent character runs (comments included).
#[derive(Default)]
struct Collector {
    tokens: Vec<Token>,
    text: String,
}

impl Collector {
    fn flush_text(&mut self) {
        if !self.text.is_empty() {
            self.tokens.push(Token::Text(std::mem::take(&mut self.text)));
        }
    }

    fn tag(&mut self, tag: Tag) -> TokenSinkResult<()> {
        self.flush_text();
        let name = tag.name.to_string();
        match tag.kind {
            TagKind::StartTag => {
                // The tokenizer alone does not know which elements hold raw text.
                let raw = match name.as_str() {
                    _ if tag.self_closing => None,
                    "script" => Some(RawKind::ScriptData),
                    "style" | "iframe" | "noscript" | "xmp" | "noembed" | "noframes" => {
                        Some(RawKind::Rawtext)
                    }
                    "textarea" | "title" => Some(RawKind::Rcdata),
                    _ => None,
                };
                self.tokens.push(Token::StartTag {
                    name,
                    attrs: tag
                        .attrs
                        .into_iter()
                        .map(|a| (a.name.local.to_string(), a.value.to_string()))
                        .collect(),
                    self_closing: tag.self_closing,
                });
                match raw {
                    Some(kind) => TokenSinkResult::RawData(kind),
                    None => TokenSinkResult::Continue,
                }
            }
            TagKind::EndTag => {
                self.tokens.push(Token::EndTag { name });
                TokenSinkResult::Continue
            }
        }
    }
}

impl TokenSink for Collector {
    type Handle = ();

    fn process_token(&mut self, token: HtmlToken, _line_number: u64) -> TokenSinkResult<()> {
        match token {
            HtmlToken::TagToken(tag) => return self.tag(tag),
            HtmlToken::CharacterTokens(text) => self.text.push_str(&text),
            HtmlToken::EOFToken => self.flush_text(),
            HtmlToken::ParseError(e) => log::trace!("html: {e}"),
            HtmlToken::DoctypeToken(_) | HtmlToken::CommentToken(_) | HtmlToken::NullCharacterToken => {}
        }
        TokenSinkResult::Continue
    }
}

pub(crate) fn tokenize(input: &str) -> Vec<Token> {
    let mut queue = BufferQueue::new();
    queue.push_back(StrTendril::from_slice(input));
    let mut tokenizer = Tokenizer::new(Collector::default(), TokenizerOpts::default());
    let _ = tokenizer.feed(&mut queue);
    tokenizer.end();
    let mut collector = tokenizer.sink;
    collector.flush_text();
    collector.tokens
}
