// Model root handed to the renderer, plus the material table it publishes

use crate::engine::assets::ModelDocument;
use glam::{Quat, Vec3};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Position, rotation and scale of the model root
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// A material whose color the appearance system may change
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGB
    pub color: Vec3,
}

/// Shared handle to a material.
///
/// The character only publishes these; recoloring is done by the appearance
/// system through [`MaterialHandle::set_color`].
#[derive(Debug, Clone)]
pub struct MaterialHandle(Rc<RefCell<Material>>);

impl MaterialHandle {
    pub fn new(name: &str, color: Vec3) -> Self {
        Self(Rc::new(RefCell::new(Material {
            name: name.to_string(),
            color,
        })))
    }

    pub fn name(&self) -> String {
        self.0.borrow().name.clone()
    }

    pub fn color(&self) -> Vec3 {
        self.0.borrow().color
    }

    /// Idempotent color set
    pub fn set_color(&self, color: Vec3) {
        self.0.borrow_mut().color = color;
    }

    /// Check whether two handles point at the same material
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// The loaded model: what a scene graph attaches and the renderer draws
#[derive(Debug, Clone)]
pub struct ModelRoot {
    pub name: String,
    pub transform: Transform,
    bones: Vec<String>,
    materials: HashMap<String, MaterialHandle>,
}

impl ModelRoot {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            transform: Transform::default(),
            bones: Vec::new(),
            materials: HashMap::new(),
        }
    }

    /// Build a model root from a decoded document
    pub fn from_document(document: &ModelDocument) -> Self {
        let materials = document
            .materials
            .iter()
            .map(|material| {
                (
                    material.name.clone(),
                    MaterialHandle::new(&material.name, Vec3::from_array(material.color)),
                )
            })
            .collect();

        Self {
            name: document.name.clone(),
            transform: Transform::default(),
            bones: document.skeleton.bones.clone(),
            materials,
        }
    }

    pub fn bones(&self) -> &[String] {
        &self.bones
    }

    pub fn has_skeleton(&self) -> bool {
        !self.bones.is_empty()
    }

    /// Material table, name to handle
    pub fn materials(&self) -> &HashMap<String, MaterialHandle> {
        &self.materials
    }

    pub fn material(&self, name: &str) -> Option<&MaterialHandle> {
        self.materials.get(name)
    }
}

/// Where a renderer attaches the model root
pub trait SceneContainer {
    fn attach(&mut self, model: &ModelRoot);
}
