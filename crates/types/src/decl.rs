//! Declarations and their dependency sets.

use std::collections::BTreeMap;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::{TypeName, TypeRef};

/// Kind of declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclKind {
	/// Plain data type.
	Type,
	/// Family grouping related types.
	Family,
	/// Idiom template.
	Idiom,
	/// Primitive action.
	Action,
	/// Composite action built from other actions.
	Procedure,
}

impl DeclKind {
	/// Returns true for kinds that carry parameters and may inherit from a parent.
	pub const fn is_action_like(self) -> bool {
		matches!(self, Self::Action | Self::Procedure)
	}
}

/// Named, typed parameter of an action.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Parameter {
	/// Parameter name.
	pub name: String,
	/// Parameter type.
	pub ty: TypeRef,
}

impl Parameter {
	/// Creates a parameter.
	pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
		Self {
			name: name.into(),
			ty: ty.into(),
		}
	}
}

/// A type, family, idiom, action or procedure declaration.
///
/// The name is fixed at construction; everything else is set through the
/// `with_*` builders before the declaration is handed to a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
	name: TypeName,
	kind: DeclKind,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	parent: Option<TypeName>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	requires: Vec<TypeRef>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	inputs: Vec<Parameter>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	outputs: Vec<Parameter>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	properties: BTreeMap<String, String>,
}

impl Declaration {
	/// Creates an empty declaration of the given kind.
	pub fn new(name: TypeName, kind: DeclKind) -> Self {
		Self {
			name,
			kind,
			parent: None,
			requires: Vec::new(),
			inputs: Vec::new(),
			outputs: Vec::new(),
			properties: BTreeMap::new(),
		}
	}

	/// Creates a plain type declaration.
	pub fn type_decl(name: TypeName) -> Self {
		Self::new(name, DeclKind::Type)
	}

	/// Creates an action declaration.
	pub fn action(name: TypeName) -> Self {
		Self::new(name, DeclKind::Action)
	}

	/// Creates a procedure declaration.
	pub fn procedure(name: TypeName) -> Self {
		Self::new(name, DeclKind::Procedure)
	}

	/// Sets the parent this declaration inherits from.
	#[must_use]
	pub fn with_parent(mut self, parent: TypeName) -> Self {
		self.parent = Some(parent);
		self
	}

	/// Adds an explicit requirement.
	#[must_use]
	pub fn with_requires(mut self, ty: impl Into<TypeRef>) -> Self {
		self.requires.push(ty.into());
		self
	}

	/// Appends an input parameter.
	#[must_use]
	pub fn with_input(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
		self.inputs.push(Parameter::new(name, ty));
		self
	}

	/// Appends an output parameter.
	#[must_use]
	pub fn with_output(mut self, name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
		self.outputs.push(Parameter::new(name, ty));
		self
	}

	/// Sets a property, replacing any previous value for `key`.
	#[must_use]
	pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.properties.insert(key.into(), value.into());
		self
	}

	pub fn name(&self) -> &TypeName {
		&self.name
	}

	pub fn kind(&self) -> DeclKind {
		self.kind
	}

	pub fn parent(&self) -> Option<&TypeName> {
		self.parent.as_ref()
	}

	pub fn requires(&self) -> &[TypeRef] {
		&self.requires
	}

	pub fn inputs(&self) -> &[Parameter] {
		&self.inputs
	}

	pub fn outputs(&self) -> &[Parameter] {
		&self.outputs
	}

	pub fn properties(&self) -> &BTreeMap<String, String> {
		&self.properties
	}

	/// Returns true for actions and procedures.
	pub fn is_action(&self) -> bool {
		self.kind.is_action_like()
	}

	/// Full positional signature: inputs followed by outputs.
	pub fn signature(&self) -> impl Iterator<Item = &Parameter> {
		self.inputs.iter().chain(self.outputs.iter())
	}

	/// Names this declaration depends on.
	///
	/// Order is parent, explicit requirements, then parameter types, each
	/// expanded to base names and de-duplicated. The declaration's own name is
	/// never included.
	pub fn required_names(&self) -> IndexSet<TypeName> {
		let mut out = IndexSet::new();
		if let Some(parent) = &self.parent {
			out.insert(parent.clone());
		}
		for ty in self.requires.iter().chain(self.signature().map(|p| &p.ty)) {
			ty.collect_base_names(&mut out);
		}
		out.shift_remove(&self.name);
		out
	}

	pub(crate) fn into_flattened(mut self, parent: &Declaration) -> Self {
		let mut inputs = parent.inputs.clone();
		inputs.append(&mut self.inputs);
		let mut outputs = parent.outputs.clone();
		outputs.append(&mut self.outputs);

		let mut properties = parent.properties.clone();
		properties.append(&mut self.properties);

		let mut requires = parent.requires.clone();
		for ty in self.requires {
			if !requires.contains(&ty) {
				requires.push(ty);
			}
		}

		Self {
			name: self.name,
			kind: self.kind,
			parent: None,
			requires,
			inputs,
			outputs,
			properties,
		}
	}
}
