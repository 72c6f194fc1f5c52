//! Path enumeration over diagrams.
//!
//! The CNFiser and the tests both need to see a diagram as its set of
//! (cube, terminal) pairs. The walk visits each path once, in variable
//! order, with don't-care variables simply absent from the cube.

use crate::mgr::{AddId, AddMgr, Node};

impl AddMgr {
    /// Visits every path of `f` with its cube (ordered `(var, polarity)`
    /// pairs) and terminal value.
    pub fn walk_paths(&self, f: AddId, visit: &mut dyn FnMut(&[(u32, bool)], i64)) {
        let mut cube: Vec<(u32, bool)> = Vec::new();
        self.walk_rec(f, &mut cube, visit);
    }

    fn walk_rec(
        &self,
        f: AddId,
        cube: &mut Vec<(u32, bool)>,
        visit: &mut dyn FnMut(&[(u32, bool)], i64),
    ) {
        match self.node_of(f) {
            Node::Leaf(v) => visit(cube, v),
            Node::Ite { var, t, e } => {
                cube.push((var, true));
                self.walk_rec(t, cube, visit);
                cube.pop();
                cube.push((var, false));
                self.walk_rec(e, cube, visit);
                cube.pop();
            }
        }
    }

    /// Cubes leading to terminals other than 1: asserting a 0/1 diagram
    /// means blocking exactly these paths.
    pub fn blocked_cubes(&self, f: AddId) -> Vec<Vec<(u32, bool)>> {
        let mut out = Vec::new();
        self.walk_paths(f, &mut |cube, leaf| {
            if leaf != 1 {
                out.push(cube.to_vec());
            }
        });
        out
    }
}
