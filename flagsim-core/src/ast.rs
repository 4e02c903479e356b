use crate::collision::Axis;
use crate::diagnostics::Span;
use crate::spatial::SpatialStrategy;

// ============================================================================
// Expressions
// ============================================================================

/// Expression AST node
#[derive(Debug, Clone)]
pub enum Expr {
    Literal(f32),
    Var(String),
    UnaryMinus(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        func: FuncName,
        args: Vec<Expr>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// Built-in function names
#[derive(Debug, Clone, Copy)]
pub enum FuncName {
    Sin,
    Cos,
    Sqrt,
    Clamp,
}

/// A `(x, y, z)` triple of expressions
#[derive(Debug, Clone)]
pub struct VecExpr {
    pub x: Expr,
    pub y: Expr,
    pub z: Expr,
}

/// Let binding declaration: `let name = expr`
#[derive(Debug, Clone)]
pub struct LetDecl {
    pub name: String,
    pub expr: Expr,
    pub span: Option<Span>,
}

// ============================================================================
// Scene declarations
// ============================================================================

/// A parsed scene file
#[derive(Debug, Clone)]
pub struct Scene {
    pub lets: Vec<LetDecl>,
    pub flag: Option<FlagDecl>,
    pub subdivide: Option<SubdivideDecl>,
    pub spheres: Vec<SphereDecl>,
    pub capsules: Vec<CapsuleDecl>,
    pub settings: Vec<SetDecl>,
    pub features: Vec<FeatureDecl>,
    pub index: Option<SpatialStrategy>,
    pub bursts: Vec<BurstDecl>,
    pub simulate: SimulateDecl,
    pub detectors: Vec<DetectorDecl>,
}

/// `flag grid C x R size (w, h) at (x, y, z) [scale (sx, sy, sz)]`
#[derive(Debug, Clone)]
pub struct FlagDecl {
    pub cols: Expr,
    pub rows: Expr,
    pub width: Expr,
    pub height: Expr,
    pub position: VecExpr,
    pub scale: Option<VecExpr>,
    pub span: Option<Span>,
}

/// `subdivide n`
#[derive(Debug, Clone)]
pub struct SubdivideDecl {
    pub levels: Expr,
    pub span: Option<Span>,
}

/// `sphere name at (x, y, z) radius r [scale (sx, sy, sz)]`
#[derive(Debug, Clone)]
pub struct SphereDecl {
    pub name: String,
    pub center: VecExpr,
    pub radius: Expr,
    pub scale: Option<VecExpr>,
    pub span: Option<Span>,
}

/// `capsule name at (x, y, z) height h radius r axis x|y|z [scale (sx, sy, sz)]`
#[derive(Debug, Clone)]
pub struct CapsuleDecl {
    pub name: String,
    pub center: VecExpr,
    pub height: Expr,
    pub radius: Expr,
    pub axis: Axis,
    pub scale: Option<VecExpr>,
    pub span: Option<Span>,
}

/// `set name = expr` or `set name = (x, y, z)`
#[derive(Debug, Clone)]
pub struct SetDecl {
    pub name: String,
    pub value: SetValue,
    pub span: Option<Span>,
}

#[derive(Debug, Clone)]
pub enum SetValue {
    Scalar(Expr),
    Vector(VecExpr),
}

/// `enable name` / `disable name`
#[derive(Debug, Clone)]
pub struct FeatureDecl {
    pub name: String,
    pub enabled: bool,
    pub span: Option<Span>,
}

/// `burst at step N duration d`
#[derive(Debug, Clone)]
pub struct BurstDecl {
    pub step: Expr,
    pub duration: Expr,
    pub span: Option<Span>,
}

/// Simulation configuration: `simulate dt = x steps = n`
#[derive(Debug, Clone)]
pub struct SimulateDecl {
    pub dt: Expr,
    pub steps: Expr, // coerced to usize
}

/// Detector declaration: `detect name = kind(...)`
#[derive(Debug, Clone)]
pub struct DetectorDecl {
    pub name: String,
    pub kind: DetectorKind,
    pub span: Option<Span>,
}

/// Detector kinds
#[derive(Debug, Clone)]
pub enum DetectorKind {
    /// Minimum world y over all particles
    LowestY,
    /// Maximum world y over all particles
    HighestY,
    /// Max minus min coordinate along an axis
    Extent(Axis),
    /// One coordinate of one particle
    Position { index: usize, axis: Axis },
    /// Distance between two particles
    Distance { a: usize, b: usize },
}
