use glam::{Mat4, Quat, Vec3};

/// Handle to a node in a [`SceneGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// A transform node. Local transform is relative to the parent group.
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: &'static str,
    pub parent: Option<NodeId>,
    pub position: Vec3,
    pub rotation: Quat,
}

impl SceneNode {
    /// Local transform matrix.
    pub fn local_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }
}

/// Minimal group/node hierarchy mirrored to whatever renders the scene.
#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level group.
    pub fn add_group(&mut self, name: &'static str) -> NodeId {
        self.push(name, None)
    }

    /// Add a node as a child of `parent`.
    pub fn add_to_group(&mut self, parent: NodeId, name: &'static str) -> NodeId {
        self.push(name, Some(parent))
    }

    fn push(&mut self, name: &'static str, parent: Option<NodeId>) -> NodeId {
        self.nodes.push(SceneNode {
            name,
            parent,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        });
        NodeId(self.nodes.len() - 1)
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        &mut self.nodes[id.0]
    }

    pub fn set_transform(&mut self, id: NodeId, position: Vec3, rotation: Quat) {
        let node = self.node_mut(id);
        node.position = position;
        node.rotation = rotation;
    }

    /// World matrix: parent transforms composed down to `id`.
    pub fn world_matrix(&self, id: NodeId) -> Mat4 {
        let node = self.node(id);
        match node.parent {
            Some(parent) => self.world_matrix(parent) * node.local_matrix(),
            None => node.local_matrix(),
        }
    }

    pub fn world_position(&self, id: NodeId) -> Vec3 {
        self.world_matrix(id).transform_point3(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_inherits_group_transform() {
        let mut scene = SceneGraph::new();
        let world = scene.add_group("world");
        let character = scene.add_to_group(world, "character");

        scene.set_transform(
            world,
            Vec3::new(0.0, 0.0, -2.0),
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
        );
        scene.set_transform(character, Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);

        // +X rotated a quarter turn about Y lands on -Z.
        let p = scene.world_position(character);
        assert!(p.abs_diff_eq(Vec3::new(0.0, 0.0, -3.0), 1e-5));
        assert_eq!(scene.node(character).parent, Some(world));
        assert_eq!(scene.node(character).name, "character");
    }
}
