//! Type names and type references.
//!
//! Names are written `namespace:name` or `namespace:name@version`. References
//! additionally allow builtin collection constructors such as `list<ns:Foo>`
//! or `map<ns:K, ns:V>`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{Result, TypesError};

/// Immutable key identifying a declaration.
///
/// Components are reference counted, so clones are cheap and names can be
/// used freely as map keys across threads.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TypeName {
	namespace: Arc<str>,
	name: Arc<str>,
	version: Option<Arc<str>>,
}

impl TypeName {
	/// Creates an unversioned name. Components are taken verbatim.
	pub fn new(namespace: impl AsRef<str>, name: impl AsRef<str>) -> Self {
		Self {
			namespace: Arc::from(namespace.as_ref()),
			name: Arc::from(name.as_ref()),
			version: None,
		}
	}

	/// Returns a copy of this name pinned to `version`.
	#[must_use]
	pub fn with_version(mut self, version: impl AsRef<str>) -> Self {
		self.version = Some(Arc::from(version.as_ref()));
		self
	}

	/// Namespace component.
	pub fn namespace(&self) -> &str {
		&self.namespace
	}

	/// Simple name component.
	pub fn simple_name(&self) -> &str {
		&self.name
	}

	/// Version component, if any.
	pub fn version(&self) -> Option<&str> {
		self.version.as_deref()
	}
}

fn is_reserved(c: char) -> bool {
	c.is_whitespace() || matches!(c, ':' | '@' | '<' | '>' | ',')
}

fn check_component(input: &str, component: &str, what: &'static str) -> Result<()> {
	if component.is_empty() {
		return Err(TypesError::InvalidName {
			input: input.to_owned(),
			reason: what,
		});
	}
	if component.chars().any(is_reserved) {
		return Err(TypesError::InvalidName {
			input: input.to_owned(),
			reason: "reserved character in name",
		});
	}
	Ok(())
}

impl FromStr for TypeName {
	type Err = TypesError;

	fn from_str(s: &str) -> Result<Self> {
		let Some((namespace, rest)) = s.split_once(':') else {
			return Err(TypesError::InvalidName {
				input: s.to_owned(),
				reason: "expected namespace:name",
			});
		};
		let (name, version) = match rest.split_once('@') {
			Some((name, version)) => (name, Some(version)),
			None => (rest, None),
		};

		check_component(s, namespace, "empty namespace")?;
		check_component(s, name, "empty name")?;
		let mut parsed = Self::new(namespace, name);
		if let Some(version) = version {
			check_component(s, version, "empty version")?;
			parsed = parsed.with_version(version);
		}
		Ok(parsed)
	}
}

impl TryFrom<String> for TypeName {
	type Error = TypesError;

	fn try_from(value: String) -> Result<Self> {
		value.parse()
	}
}

impl From<TypeName> for String {
	fn from(value: TypeName) -> Self {
		value.to_string()
	}
}

impl fmt::Display for TypeName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.namespace, self.name)?;
		if let Some(version) = &self.version {
			write!(f, "@{version}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for TypeName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TypeName({self})")
	}
}

/// Builtin parameterized type constructors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
	/// Ordered sequence.
	List,
	/// Unordered unique elements.
	Set,
	/// Unordered elements with repetition.
	Bag,
	/// Optional value.
	Nullable,
	/// Key/value mapping.
	Map,
}

impl CollectionKind {
	/// Keyword used in the textual form.
	pub const fn keyword(self) -> &'static str {
		match self {
			Self::List => "list",
			Self::Set => "set",
			Self::Bag => "bag",
			Self::Nullable => "nullable",
			Self::Map => "map",
		}
	}

	/// Number of type arguments the constructor takes.
	pub const fn arity(self) -> usize {
		match self {
			Self::Map => 2,
			_ => 1,
		}
	}

	fn from_keyword(keyword: &str) -> Option<Self> {
		Some(match keyword {
			"list" => Self::List,
			"set" => Self::Set,
			"bag" => Self::Bag,
			"nullable" => Self::Nullable,
			"map" => Self::Map,
			_ => return None,
		})
	}
}

/// A type as it appears in a declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TypeRef {
	/// A reference to a declared type.
	Named(TypeName),
	/// A builtin collection over other types.
	Generic {
		/// Collection constructor.
		kind: CollectionKind,
		/// Type arguments, `kind.arity()` of them.
		args: Vec<TypeRef>,
	},
}

impl TypeRef {
	/// Shorthand for `list<element>`.
	pub fn list(element: impl Into<TypeRef>) -> Self {
		Self::Generic {
			kind: CollectionKind::List,
			args: vec![element.into()],
		}
	}

	/// Named leaves this reference mentions, in first-seen order.
	///
	/// Collection constructors are builtin, so `list<ns:Foo>` yields `ns:Foo`.
	pub fn base_names(&self) -> Vec<TypeName> {
		let mut out = IndexSet::new();
		self.collect_base_names(&mut out);
		out.into_iter().collect()
	}

	pub(crate) fn collect_base_names(&self, out: &mut IndexSet<TypeName>) {
		match self {
			Self::Named(name) => {
				out.insert(name.clone());
			}
			Self::Generic { args, .. } => {
				for arg in args {
					arg.collect_base_names(out);
				}
			}
		}
	}
}

impl From<TypeName> for TypeRef {
	fn from(value: TypeName) -> Self {
		Self::Named(value)
	}
}

impl FromStr for TypeRef {
	type Err = TypesError;

	fn from_str(s: &str) -> Result<Self> {
		let mut parser = RefParser { input: s, pos: 0 };
		let parsed = parser.parse_ref()?;
		parser.skip_ws();
		if parser.pos != s.len() {
			return Err(parser.error("trailing characters"));
		}
		Ok(parsed)
	}
}

impl TryFrom<String> for TypeRef {
	type Error = TypesError;

	fn try_from(value: String) -> Result<Self> {
		value.parse()
	}
}

impl From<TypeRef> for String {
	fn from(value: TypeRef) -> Self {
		value.to_string()
	}
}

impl fmt::Display for TypeRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Named(name) => write!(f, "{name}"),
			Self::Generic { kind, args } => {
				write!(f, "{}<", kind.keyword())?;
				for (i, arg) in args.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					write!(f, "{arg}")?;
				}
				f.write_str(">")
			}
		}
	}
}

struct RefParser<'a> {
	input: &'a str,
	pos: usize,
}

impl RefParser<'_> {
	fn peek(&self) -> Option<char> {
		self.input[self.pos..].chars().next()
	}

	fn skip_ws(&mut self) {
		while let Some(c) = self.peek() {
			if !c.is_whitespace() {
				break;
			}
			self.pos += c.len_utf8();
		}
	}

	fn error(&self, reason: &'static str) -> TypesError {
		TypesError::InvalidTypeRef {
			input: self.input.to_owned(),
			reason,
		}
	}

	fn parse_ref(&mut self) -> Result<TypeRef> {
		self.skip_ws();
		let start = self.pos;
		while let Some(c) = self.peek() {
			if matches!(c, '<' | '>' | ',') || c.is_whitespace() {
				break;
			}
			self.pos += c.len_utf8();
		}
		let head = &self.input[start..self.pos];
		if head.is_empty() {
			return Err(self.error("expected a type"));
		}

		self.skip_ws();
		if self.peek() != Some('<') {
			return Ok(TypeRef::Named(head.parse()?));
		}

		let kind = CollectionKind::from_keyword(head).ok_or_else(|| self.error("unknown collection constructor"))?;
		self.pos += 1;
		let mut args = vec![self.parse_ref()?];
		loop {
			self.skip_ws();
			match self.peek() {
				Some(',') => {
					self.pos += 1;
					args.push(self.parse_ref()?);
				}
				Some('>') => {
					self.pos += 1;
					break;
				}
				_ => return Err(self.error("unterminated type arguments")),
			}
		}

		if args.len() != kind.arity() {
			return Err(self.error("wrong number of type arguments"));
		}
		Ok(TypeRef::Generic { kind, args })
	}
}
