//! Mutable operator descriptors and their serialized form.
//!
//! An [`OpDesc`] keeps live binding and attribute maps and rebuilds its wire
//! form ([`OpDescProto`]) lazily: setters mark the descriptor dirty and the
//! next [`OpDesc::flush`] or [`OpDesc::proto`] regenerates it once.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::attribute::{AttrType, Attribute, AttributeMap};
use crate::error::FrameworkError;
use crate::Result;

/// Parameter name → ordered variable names bound to it.
pub type VariableNameMap = BTreeMap<String, Vec<String>>;

/// Attribute holding variable names that follow renames.
pub const OP_ROLE_VAR_ATTR: &str = "op_role_var";

/// One parameter binding in the wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpDescVar {
    pub parameter: String,
    pub arguments: Vec<String>,
}

/// One attribute in the wire form: `{ "name", "type", "value" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDescAttr {
    pub name: String,
    #[serde(flatten)]
    pub value: Attribute,
}

/// Serialized operator descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpDescProto {
    #[serde(rename = "type")]
    pub type_: String,
    pub inputs: Vec<OpDescVar>,
    pub outputs: Vec<OpDescVar>,
    pub attrs: Vec<OpDescAttr>,
}

#[derive(Debug, Clone, Default)]
pub struct OpDesc {
    type_: String,
    inputs: VariableNameMap,
    outputs: VariableNameMap,
    attrs: AttributeMap,
    desc: OpDescProto,
    need_update: bool,
}

impl OpDesc {
    pub fn new(
        type_: impl Into<String>,
        inputs: VariableNameMap,
        outputs: VariableNameMap,
        attrs: AttributeMap,
    ) -> Self {
        Self {
            type_: type_.into(),
            inputs,
            outputs,
            attrs,
            desc: OpDescProto::default(),
            need_update: true,
        }
    }

    /// Rebuild live maps from a wire descriptor. The result starts clean.
    pub fn from_proto(proto: &OpDescProto) -> Self {
        let to_map = |vars: &[OpDescVar]| -> VariableNameMap {
            vars.iter()
                .map(|v| (v.parameter.clone(), v.arguments.clone()))
                .collect()
        };
        Self {
            type_: proto.type_.clone(),
            inputs: to_map(&proto.inputs),
            outputs: to_map(&proto.outputs),
            attrs: proto
                .attrs
                .iter()
                .map(|a| (a.name.clone(), a.value.clone()))
                .collect(),
            desc: proto.clone(),
            need_update: false,
        }
    }

    pub fn copy_from(&mut self, other: &OpDesc) {
        self.type_ = other.type_.clone();
        self.inputs = other.inputs.clone();
        self.outputs = other.outputs.clone();
        self.attrs = other.attrs.clone();
        self.need_update = true;
    }

    pub fn type_(&self) -> &str {
        &self.type_
    }

    pub fn set_type(&mut self, type_: impl Into<String>) {
        self.type_ = type_.into();
        self.need_update = true;
    }

    // =========================================================================
    // Bindings
    // =========================================================================

    pub fn input(&self, param: &str) -> Result<&[String]> {
        lookup(&self.type_, &self.inputs, param)
    }

    pub fn output(&self, param: &str) -> Result<&[String]> {
        lookup(&self.type_, &self.outputs, param)
    }

    /// Every bound input variable, parameters in key order.
    pub fn input_argument_names(&self) -> Vec<String> {
        self.inputs.values().flatten().cloned().collect()
    }

    pub fn output_argument_names(&self) -> Vec<String> {
        self.outputs.values().flatten().cloned().collect()
    }

    /// Input parameter names.
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.keys().cloned().collect()
    }

    pub fn output_names(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    pub fn inputs(&self) -> &VariableNameMap {
        &self.inputs
    }

    pub fn outputs(&self) -> &VariableNameMap {
        &self.outputs
    }

    pub fn set_input(&mut self, param: impl Into<String>, args: Vec<String>) {
        self.inputs.insert(param.into(), args);
        self.need_update = true;
    }

    pub fn set_output(&mut self, param: impl Into<String>, args: Vec<String>) {
        self.outputs.insert(param.into(), args);
        self.need_update = true;
    }

    // =========================================================================
    // Attributes
    // =========================================================================

    pub fn attr_type(&self, name: &str) -> Result<AttrType> {
        Ok(self.get_attr(name)?.attr_type())
    }

    pub fn attr_names(&self) -> Vec<String> {
        self.attrs.keys().cloned().collect()
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<Attribute>) {
        self.attrs.insert(name.into(), value.into());
        self.need_update = true;
    }

    pub fn set_attr_map(&mut self, attrs: AttributeMap) {
        self.attrs = attrs;
        self.need_update = true;
    }

    pub fn get_attr(&self, name: &str) -> Result<&Attribute> {
        self.attrs
            .get(name)
            .ok_or_else(|| FrameworkError::MissingAttribute {
                op_type: self.type_.clone(),
                name: name.to_string(),
            })
    }

    /// Like [`OpDesc::get_attr`], but returns [`Attribute::Blank`] when absent.
    pub fn get_nullable_attr(&self, name: &str) -> Attribute {
        self.attrs.get(name).cloned().unwrap_or(Attribute::Blank)
    }

    pub fn attr_map(&self) -> &AttributeMap {
        &self.attrs
    }

    // =========================================================================
    // Renaming
    // =========================================================================

    /// Replace `old` with `new` in every binding and in the role-variable list.
    pub fn rename(&mut self, old: &str, new: &str) {
        self.rename_input(old, new);
        self.rename_output(old, new);
    }

    pub fn rename_input(&mut self, old: &str, new: &str) {
        replace_all(self.inputs.values_mut().flatten(), old, new);
        self.rename_role_vars(old, new);
        self.need_update = true;
    }

    pub fn rename_output(&mut self, old: &str, new: &str) {
        replace_all(self.outputs.values_mut().flatten(), old, new);
        self.rename_role_vars(old, new);
        self.need_update = true;
    }

    fn rename_role_vars(&mut self, old: &str, new: &str) {
        if let Some(Attribute::Strings(vars)) = self.attrs.get_mut(OP_ROLE_VAR_ATTR) {
            replace_all(vars.iter_mut(), old, new);
        }
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn is_dirty(&self) -> bool {
        self.need_update
    }

    /// Rebuild the wire form if any setter ran since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.need_update {
            return Ok(());
        }
        let to_vars = |map: &VariableNameMap| -> Vec<OpDescVar> {
            map.iter()
                .map(|(param, args)| OpDescVar {
                    parameter: param.clone(),
                    arguments: args.clone(),
                })
                .collect()
        };
        let mut attrs = Vec::with_capacity(self.attrs.len());
        for (name, value) in &self.attrs {
            if value.is_blank() {
                return Err(FrameworkError::Serialization(format!(
                    "Unexpected branch: attribute '{}' of {} is blank",
                    name, self.type_
                )));
            }
            attrs.push(OpDescAttr {
                name: name.clone(),
                value: value.clone(),
            });
        }
        self.desc = OpDescProto {
            type_: self.type_.clone(),
            inputs: to_vars(&self.inputs),
            outputs: to_vars(&self.outputs),
            attrs,
        };
        self.need_update = false;
        Ok(())
    }

    pub fn proto(&mut self) -> Result<&OpDescProto> {
        self.flush()?;
        Ok(&self.desc)
    }
}

fn lookup<'a>(op_type: &str, map: &'a VariableNameMap, param: &str) -> Result<&'a [String]> {
    map.get(param)
        .map(Vec::as_slice)
        .ok_or_else(|| FrameworkError::MissingParameter {
            op_type: op_type.to_string(),
            param: param.to_string(),
        })
}

fn replace_all<'a>(names: impl Iterator<Item = &'a mut String>, old: &str, new: &str) {
    for name in names {
        if name == old {
            *name = new.to_string();
        }
    }
}
