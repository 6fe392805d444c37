//! Selector matching contract, backed by the `selectors` crate
//!
//! Querying only needs two things from a selector engine: turn a selector
//! string into a [`Matcher`] once, then run that matcher over a tree. Both
//! sides are traits so another engine can be plugged in.
//!
//! [`CssCompiler`] parses with `selectors`/`cssparser` and matches through
//! [`ArenaElement`], an `Element` implementation over the arena. Besides the
//! structural pseudo-classes `selectors` ships with (`:nth-child`, `:not`,
//! `:is`, `:has`, `:empty`, `:root`, ...) it understands the attribute-driven
//! states `:link`, `:any-link`, `:checked`, `:disabled`, `:enabled`,
//! `:required` and `:optional`. Pseudo-elements and dynamic states such as
//! `:hover` are rejected with `DomError::InvalidSelector`.

use crate::arena::DomArena;
use crate::error::{DomError, Result};
use crate::types::{DomNode, NodeId, NodeType};
use ahash::AHasher;
use cssparser::{ParseError, ParserInput, ToCss};
use precomputed_hash::PrecomputedHash;
use selectors::attr::{AttrSelectorOperation, CaseSensitivity, NamespaceConstraint};
use selectors::matching::{
    matches_selector_list, ElementSelectorFlags, IgnoreNthChildForInvalidation, MatchingContext,
    MatchingMode, NeedsSelectorFlags, QuirksMode,
};
use selectors::parser::{ParseRelative, SelectorList, SelectorParseErrorKind};
use selectors::{NthIndexCache, OpaqueElement};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A compiled selector
pub trait Matcher: Send + Sync {
    /// Does the element `node_id` match?
    fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool;

    /// All matching elements among `roots` and their descendants, in
    /// document order
    fn run(&self, arena: &DomArena, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut found = Vec::new();

        for &root_id in roots {
            arena.traverse_df(root_id, |node| {
                if node.is_element() && self.matches(arena, node.node_id) {
                    found.push(node.node_id);
                }
                Ok(())
            })?;
        }

        Ok(found)
    }
}

/// Turns selector strings into matchers
pub trait SelectorCompiler: Send + Sync {
    fn compile(&self, selector: &str) -> Result<Arc<dyn Matcher>>;
}

/// CSS selector compiler on top of `selectors`
#[derive(Debug, Default, Clone, Copy)]
pub struct CssCompiler;

impl SelectorCompiler for CssCompiler {
    fn compile(&self, selector: &str) -> Result<Arc<dyn Matcher>> {
        let mut input = ParserInput::new(selector);
        let mut parser = cssparser::Parser::new(&mut input);

        let list = SelectorList::parse(&QueryParser, &mut parser, ParseRelative::No)
            .map_err(|err| DomError::invalid_selector(selector, describe(&err)))?;

        Ok(Arc::new(CompiledSelector { list }))
    }
}

fn describe(err: &ParseError<'_, SelectorParseErrorKind<'_>>) -> String {
    format!("{:?} at column {}", err.kind, err.location.column)
}

/// A parsed selector list
struct CompiledSelector {
    list: SelectorList<DomSelectorImpl>,
}

impl CompiledSelector {
    fn matches_with(&self, element: &ArenaElement<'_>, cache: &mut NthIndexCache) -> bool {
        let mut context = MatchingContext::new(
            MatchingMode::Normal,
            None,
            cache,
            QuirksMode::NoQuirks,
            NeedsSelectorFlags::No,
            IgnoreNthChildForInvalidation::No,
        );
        matches_selector_list(&self.list, element, &mut context)
    }
}

impl Matcher for CompiledSelector {
    fn matches(&self, arena: &DomArena, node_id: NodeId) -> bool {
        ArenaElement::new(arena, node_id)
            .is_some_and(|element| self.matches_with(&element, &mut NthIndexCache::default()))
    }

    // One nth-index cache for the whole walk
    fn run(&self, arena: &DomArena, roots: &[NodeId]) -> Result<Vec<NodeId>> {
        let mut cache = NthIndexCache::default();
        let mut found = Vec::new();

        for &root_id in roots {
            arena.traverse_df(root_id, |node| {
                if let Some(element) = ArenaElement::new(arena, node.node_id) {
                    if self.matches_with(&element, &mut cache) {
                        found.push(node.node_id);
                    }
                }
                Ok(())
            })?;
        }

        Ok(found)
    }
}

/// Selector parser configuration
struct QueryParser;

impl<'i> selectors::parser::Parser<'i> for QueryParser {
    type Impl = DomSelectorImpl;
    type Error = SelectorParseErrorKind<'i>;

    fn parse_is_and_where(&self) -> bool {
        true
    }

    fn parse_has(&self) -> bool {
        true
    }

    fn parse_non_ts_pseudo_class(
        &self,
        location: cssparser::SourceLocation,
        name: cssparser::CowRcStr<'i>,
    ) -> std::result::Result<PseudoClass, ParseError<'i, SelectorParseErrorKind<'i>>> {
        let pseudo = match name.to_ascii_lowercase().as_str() {
            "link" => PseudoClass::Link,
            "any-link" => PseudoClass::AnyLink,
            "checked" => PseudoClass::Checked,
            "disabled" => PseudoClass::Disabled,
            "enabled" => PseudoClass::Enabled,
            "required" => PseudoClass::Required,
            "optional" => PseudoClass::Optional,
            _ => {
                return Err(location
                    .new_custom_error(SelectorParseErrorKind::UnsupportedPseudoClassOrElement(name)))
            }
        };
        Ok(pseudo)
    }
}

/// Owned string used for every name and value slot of the selector types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CssString(pub String);

impl From<&str> for CssString {
    fn from(s: &str) -> Self {
        CssString(s.to_string())
    }
}

impl AsRef<str> for CssString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for CssString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl ToCss for CssString {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        cssparser::serialize_identifier(&self.0, dest)
    }
}

impl PrecomputedHash for CssString {
    fn precomputed_hash(&self) -> u32 {
        let mut hasher = AHasher::default();
        self.0.hash(&mut hasher);
        hasher.finish() as u32
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DomSelectorImpl;

impl selectors::SelectorImpl for DomSelectorImpl {
    type ExtraMatchingData<'a> = ();
    type AttrValue = CssString;
    type Identifier = CssString;
    type LocalName = CssString;
    type NamespacePrefix = CssString;
    type NamespaceUrl = CssString;
    type BorrowedLocalName = str;
    type BorrowedNamespaceUrl = str;
    type NonTSPseudoClass = PseudoClass;
    type PseudoElement = PseudoElement;
}

/// Pseudo-classes decided by attributes alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PseudoClass {
    Link,
    AnyLink,
    Checked,
    Disabled,
    Enabled,
    Required,
    Optional,
}

impl PseudoClass {
    fn name(self) -> &'static str {
        match self {
            PseudoClass::Link => "link",
            PseudoClass::AnyLink => "any-link",
            PseudoClass::Checked => "checked",
            PseudoClass::Disabled => "disabled",
            PseudoClass::Enabled => "enabled",
            PseudoClass::Required => "required",
            PseudoClass::Optional => "optional",
        }
    }
}

impl selectors::parser::NonTSPseudoClass for PseudoClass {
    type Impl = DomSelectorImpl;

    fn is_active_or_hover(&self) -> bool {
        false
    }

    fn is_user_action_state(&self) -> bool {
        false
    }
}

impl ToCss for PseudoClass {
    fn to_css<W>(&self, dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        dest.write_char(':')?;
        dest.write_str(self.name())
    }
}

/// No pseudo-elements exist in a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoElement {}

impl selectors::parser::PseudoElement for PseudoElement {
    type Impl = DomSelectorImpl;
}

impl ToCss for PseudoElement {
    fn to_css<W>(&self, _dest: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match *self {}
    }
}

const FORM_CONTROLS: &[&str] = &["button", "input", "select", "textarea", "optgroup", "option", "fieldset"];
const REQUIRABLE: &[&str] = &["input", "select", "textarea"];

/// An element node of the arena, as seen by `selectors`
#[derive(Clone, Copy)]
pub struct ArenaElement<'a> {
    arena: &'a DomArena,
    node: &'a DomNode,
}

impl<'a> ArenaElement<'a> {
    /// `None` unless `node_id` is an element
    pub fn new(arena: &'a DomArena, node_id: NodeId) -> Option<Self> {
        let node = arena.get(node_id).ok()?;
        node.is_element().then_some(Self { arena, node })
    }

    fn wrap(&self, node_id: Option<NodeId>) -> Option<Self> {
        ArenaElement::new(self.arena, node_id?)
    }

    fn is_one_of(&self, tags: &[&str]) -> bool {
        tags.iter().any(|tag| self.node.has_tag(tag))
    }

    fn has_attr(&self, name: &str) -> bool {
        self.node.attr(name).is_some()
    }
}

impl fmt::Debug for ArenaElement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaElement")
            .field("node_id", &self.node.node_id)
            .field("name", &self.node.node_name)
            .finish_non_exhaustive()
    }
}

impl<'a> selectors::Element for ArenaElement<'a> {
    type Impl = DomSelectorImpl;

    fn opaque(&self) -> OpaqueElement {
        OpaqueElement::new(self.node)
    }

    fn parent_element(&self) -> Option<Self> {
        self.wrap(self.arena.parent_element(self.node.node_id))
    }

    fn parent_node_is_shadow_root(&self) -> bool {
        false
    }

    fn containing_shadow_host(&self) -> Option<Self> {
        None
    }

    fn is_pseudo_element(&self) -> bool {
        false
    }

    fn prev_sibling_element(&self) -> Option<Self> {
        self.wrap(self.arena.prev_element_sibling(self.node.node_id))
    }

    fn next_sibling_element(&self) -> Option<Self> {
        self.wrap(self.arena.next_element_sibling(self.node.node_id))
    }

    fn first_element_child(&self) -> Option<Self> {
        self.node
            .children_ids
            .iter()
            .find_map(|&child_id| ArenaElement::new(self.arena, child_id))
    }

    // Every snapshot comes from an HTML parser; this is what makes
    // `type`, `http-equiv`, `rel` and friends compare without case
    fn is_html_element_in_html_document(&self) -> bool {
        true
    }

    fn has_local_name(&self, local_name: &str) -> bool {
        self.node.has_tag(local_name)
    }

    fn has_namespace(&self, _ns: &str) -> bool {
        true
    }

    fn is_same_type(&self, other: &Self) -> bool {
        self.node.node_name.eq_ignore_ascii_case(&other.node.node_name)
    }

    fn attr_matches(
        &self,
        _ns: &NamespaceConstraint<&CssString>,
        local_name: &CssString,
        operation: &AttrSelectorOperation<&CssString>,
    ) -> bool {
        self.node
            .attr(&local_name.0)
            .is_some_and(|value| operation.eval_str(value))
    }

    fn match_non_ts_pseudo_class(
        &self,
        pc: &PseudoClass,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match pc {
            PseudoClass::Link | PseudoClass::AnyLink => self.is_link(),
            PseudoClass::Checked => {
                (self.node.has_tag("input")
                    && self.has_attr("checked")
                    && self.node.attr("type").is_some_and(|kind| {
                        kind.eq_ignore_ascii_case("checkbox") || kind.eq_ignore_ascii_case("radio")
                    }))
                    || (self.node.has_tag("option") && self.has_attr("selected"))
            }
            PseudoClass::Disabled => self.is_one_of(FORM_CONTROLS) && self.has_attr("disabled"),
            PseudoClass::Enabled => self.is_one_of(FORM_CONTROLS) && !self.has_attr("disabled"),
            PseudoClass::Required => self.is_one_of(REQUIRABLE) && self.has_attr("required"),
            PseudoClass::Optional => self.is_one_of(REQUIRABLE) && !self.has_attr("required"),
        }
    }

    fn match_pseudo_element(
        &self,
        pe: &PseudoElement,
        _context: &mut MatchingContext<Self::Impl>,
    ) -> bool {
        match *pe {}
    }

    fn apply_selector_flags(&self, _flags: ElementSelectorFlags) {}

    fn is_link(&self) -> bool {
        self.is_one_of(&["a", "area", "link"]) && self.has_attr("href")
    }

    fn is_html_slot_element(&self) -> bool {
        self.node.has_tag("slot")
    }

    fn has_id(&self, id: &CssString, case_sensitivity: CaseSensitivity) -> bool {
        self.node.attr("id").is_some_and(|value| match case_sensitivity {
            CaseSensitivity::CaseSensitive => value == id.0,
            CaseSensitivity::AsciiCaseInsensitive => value.eq_ignore_ascii_case(&id.0),
        })
    }

    fn has_class(&self, name: &CssString, case_sensitivity: CaseSensitivity) -> bool {
        self.node.attr("class").is_some_and(|classes| {
            classes.split_ascii_whitespace().any(|class| match case_sensitivity {
                CaseSensitivity::CaseSensitive => class == name.0,
                CaseSensitivity::AsciiCaseInsensitive => class.eq_ignore_ascii_case(&name.0),
            })
        })
    }

    fn imported_part(&self, _name: &CssString) -> Option<CssString> {
        None
    }

    fn is_part(&self, _name: &CssString) -> bool {
        false
    }

    /// No element children and no text, whitespace included
    fn is_empty(&self) -> bool {
        self.node.children_ids.iter().all(|&child_id| {
            self.arena.get(child_id).map_or(true, |child| {
                !child.is_element() && !(child.is_text() && !child.node_value.is_empty())
            })
        })
    }

    fn is_root(&self) -> bool {
        self.node
            .parent_id
            .and_then(|parent_id| self.arena.get(parent_id).ok())
            .is_some_and(|parent| parent.node_type == NodeType::Document)
    }
}
