//! Line-oriented parser for scene files.
//!
//! Every non-empty, non-comment line is one declaration; the leading keyword
//! selects the declaration kind.

use crate::ast::{
    BinaryOp, BurstDecl, CapsuleDecl, DetectorDecl, DetectorKind, Expr, FeatureDecl, FlagDecl,
    FuncName, LetDecl, Scene, SetDecl, SetValue, SimulateDecl, SphereDecl, SubdivideDecl, VecExpr,
};
use crate::collision::Axis;
use crate::diagnostics::Span;
use crate::spatial::SpatialStrategy;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("{message}")]
    SyntaxError {
        message: String,
        span: Option<Span>,
    },
}

impl ParseError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self::SyntaxError {
            message: message.into(),
            span: None,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Self::SyntaxError { span, .. } => *span,
        }
    }
}

/// Byte offsets of line starts, for spans
struct ParseContext {
    line_offsets: Vec<usize>,
    len: usize,
}

impl ParseContext {
    fn new(source: &str) -> Self {
        let mut line_offsets = vec![0];
        let mut offset = 0;
        for ch in source.chars() {
            offset += ch.len_utf8();
            if ch == '\n' {
                line_offsets.push(offset);
            }
        }
        Self {
            line_offsets,
            len: source.len(),
        }
    }

    fn line_start(&self, line: usize) -> usize {
        self.line_offsets.get(line).copied().unwrap_or(0)
    }

    /// Span covering the whole of `line` (0-indexed)
    fn full_line_span(&self, line: usize) -> Span {
        let start = self.line_start(line);
        let end = self.line_offsets.get(line + 1).copied().unwrap_or(self.len);
        Span::new(start, end)
    }
}

/// Parse a scene file
pub fn parse_scene(source: &str) -> Result<Scene, ParseError> {
    let ctx = ParseContext::new(source);
    let mut scene = Scene {
        lets: Vec::new(),
        flag: None,
        subdivide: None,
        spheres: Vec::new(),
        capsules: Vec::new(),
        settings: Vec::new(),
        features: Vec::new(),
        index: None,
        bursts: Vec::new(),
        simulate: SimulateDecl {
            dt: Expr::Literal(0.0),
            steps: Expr::Literal(0.0),
        },
        detectors: Vec::new(),
    };
    let mut simulate = None;

    for (i, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let span = Some(ctx.full_line_span(i));
        let keyword = line.split_whitespace().next().unwrap_or("");

        match keyword {
            "let" => scene.lets.push(parse_let(line, span)?),
            "flag" => {
                if scene.flag.is_some() {
                    return Err(ParseError::new("Duplicate 'flag' declaration", span));
                }
                scene.flag = Some(parse_flag(line, span)?);
            }
            "subdivide" => {
                let levels = parse_expr(&line["subdivide".len()..], span)?;
                scene.subdivide = Some(SubdivideDecl { levels, span });
            }
            "sphere" => scene.spheres.push(parse_sphere(line, span)?),
            "capsule" => scene.capsules.push(parse_capsule(line, span)?),
            "set" => scene.settings.push(parse_set(line, span)?),
            "enable" | "disable" => scene.features.push(parse_feature(line, span)?),
            "index" => scene.index = Some(parse_index(line, span)?),
            "burst" => scene.bursts.push(parse_burst(line, span)?),
            "simulate" => simulate = Some(parse_simulate(line, span)?),
            "detect" => scene.detectors.push(parse_detector(line, span)?),
            _ => {
                return Err(ParseError::new(
                    format!("Unexpected token: {}", keyword),
                    span,
                ));
            }
        }
    }

    scene.simulate =
        simulate.ok_or_else(|| ParseError::message("Missing 'simulate' declaration"))?;
    Ok(scene)
}

// ============================================================================
// Helpers
// ============================================================================

/// Split `s` at the first occurrence of `keyword`, trimming both halves
fn split_keyword<'a>(
    s: &'a str,
    keyword: &str,
    line: &str,
    span: Option<Span>,
) -> Result<(&'a str, &'a str), ParseError> {
    let pos = s.find(keyword).ok_or_else(|| {
        ParseError::new(format!("Expected '{}' in: {}", keyword.trim(), line), span)
    })?;
    Ok((s[..pos].trim(), s[pos + keyword.len()..].trim()))
}

/// Take a leading parenthesized group; returns its contents and the remainder
fn take_group<'a>(s: &'a str, line: &str, span: Option<Span>) -> Result<(&'a str, &'a str), ParseError> {
    let s = s.trim_start();
    if !s.starts_with('(') {
        return Err(ParseError::new(format!("Expected '(' in: {}", line), span));
    }
    let mut depth = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&s[1..i], s[i + 1..].trim()));
                }
            }
            _ => {}
        }
    }
    Err(ParseError::new(format!("Unclosed '(' in: {}", line), span))
}

/// Split on commas that are not nested inside parentheses
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0;
    let mut start = 0;
    for (i, ch) in s.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}

/// Parse the contents of a group as exactly `n` comma-separated expressions
fn parse_tuple(inner: &str, n: usize, line: &str, span: Option<Span>) -> Result<Vec<Expr>, ParseError> {
    let parts = split_top_level(inner);
    if parts.len() != n {
        return Err(ParseError::new(
            format!("Expected {} components, got {} in: {}", n, parts.len(), line),
            span,
        ));
    }
    parts.into_iter().map(|p| parse_expr(p, span)).collect()
}

fn parse_vec3(inner: &str, line: &str, span: Option<Span>) -> Result<VecExpr, ParseError> {
    let mut components = parse_tuple(inner, 3, line, span)?.into_iter();
    match (components.next(), components.next(), components.next()) {
        (Some(x), Some(y), Some(z)) => Ok(VecExpr { x, y, z }),
        _ => Err(ParseError::new(format!("Expected (x, y, z) in: {}", line), span)),
    }
}

/// Parse an optional trailing `scale (sx, sy, sz)`
fn parse_scale(rest: &str, line: &str, span: Option<Span>) -> Result<Option<VecExpr>, ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Ok(None);
    }
    let after = rest.strip_prefix("scale").ok_or_else(|| {
        ParseError::new(format!("Unexpected trailing input '{}' in: {}", rest, line), span)
    })?;
    let (inner, trailing) = take_group(after, line, span)?;
    if !trailing.is_empty() {
        return Err(ParseError::new(
            format!("Unexpected trailing input '{}' in: {}", trailing, line),
            span,
        ));
    }
    Ok(Some(parse_vec3(inner, line, span)?))
}

/// Split `s` before an optional ` scale (...)` suffix
fn split_scale(s: &str) -> (&str, &str) {
    match s.find(" scale") {
        Some(pos) => (s[..pos].trim(), &s[pos..]),
        None => (s.trim(), ""),
    }
}

fn parse_axis(s: &str, line: &str, span: Option<Span>) -> Result<Axis, ParseError> {
    Axis::from_name(s.trim())
        .ok_or_else(|| ParseError::new(format!("Expected axis x, y or z in: {}", line), span))
}

fn parse_index_literal(s: &str, line: &str, span: Option<Span>) -> Result<usize, ParseError> {
    s.trim().parse::<usize>().map_err(|_| {
        ParseError::new(
            format!("Expected a particle index, got '{}' in: {}", s.trim(), line),
            span,
        )
    })
}

// ============================================================================
// Declarations
// ============================================================================

/// Parse a let declaration: `let name = expr`
fn parse_let(line: &str, span: Option<Span>) -> Result<LetDecl, ParseError> {
    let rest = &line["let".len()..];
    let (name, expr_str) = split_keyword(rest, " = ", line, span)?;
    if !is_valid_identifier(name) {
        return Err(ParseError::new(
            format!("Invalid variable name '{}' in let declaration", name),
            span,
        ));
    }
    Ok(LetDecl {
        name: name.to_string(),
        expr: parse_expr(expr_str, span)?,
        span,
    })
}

/// Parse `flag grid C x R size (w, h) at (x, y, z) [scale (sx, sy, sz)]`
fn parse_flag(line: &str, span: Option<Span>) -> Result<FlagDecl, ParseError> {
    let rest = line["flag".len()..].trim_start();
    let rest = rest.strip_prefix("grid ").ok_or_else(|| {
        ParseError::new(format!("Expected 'flag grid' in: {}", line), span)
    })?;

    let (cols, rest) = split_keyword(rest, " x ", line, span)?;
    let (rows, rest) = split_keyword(rest, "size", line, span)?;
    let (size_inner, rest) = take_group(rest, line, span)?;
    let size = parse_tuple(size_inner, 2, line, span)?;
    let rest = rest.strip_prefix("at").ok_or_else(|| {
        ParseError::new(format!("Expected 'at' after flag size in: {}", line), span)
    })?;
    let (position_inner, rest) = take_group(rest, line, span)?;

    let mut size = size.into_iter();
    let (Some(width), Some(height)) = (size.next(), size.next()) else {
        return Err(ParseError::new(format!("Expected (width, height) in: {}", line), span));
    };

    Ok(FlagDecl {
        cols: parse_expr(cols, span)?,
        rows: parse_expr(rows, span)?,
        width,
        height,
        position: parse_vec3(position_inner, line, span)?,
        scale: parse_scale(rest, line, span)?,
        span,
    })
}

/// Parse `sphere name at (x, y, z) radius r [scale (sx, sy, sz)]`
fn parse_sphere(line: &str, span: Option<Span>) -> Result<SphereDecl, ParseError> {
    let rest = &line["sphere".len()..];
    let (name, rest) = split_keyword(rest, " at ", line, span)?;
    if !is_valid_identifier(name) {
        return Err(ParseError::new(format!("Invalid sphere name '{}'", name), span));
    }
    let (center_inner, rest) = take_group(rest, line, span)?;
    let rest = rest.strip_prefix("radius").ok_or_else(|| {
        ParseError::new(format!("Expected 'radius' in sphere: {}", line), span)
    })?;
    let (radius, scale) = split_scale(rest);

    Ok(SphereDecl {
        name: name.to_string(),
        center: parse_vec3(center_inner, line, span)?,
        radius: parse_expr(radius, span)?,
        scale: parse_scale(scale, line, span)?,
        span,
    })
}

/// Parse `capsule name at (x, y, z) height h radius r axis a [scale (sx, sy, sz)]`
fn parse_capsule(line: &str, span: Option<Span>) -> Result<CapsuleDecl, ParseError> {
    let rest = &line["capsule".len()..];
    let (name, rest) = split_keyword(rest, " at ", line, span)?;
    if !is_valid_identifier(name) {
        return Err(ParseError::new(format!("Invalid capsule name '{}'", name), span));
    }
    let (center_inner, rest) = take_group(rest, line, span)?;
    let rest = rest.strip_prefix("height").ok_or_else(|| {
        ParseError::new(format!("Expected 'height' in capsule: {}", line), span)
    })?;
    let (height, rest) = split_keyword(rest, " radius ", line, span)?;
    let (radius, rest) = split_keyword(rest, " axis ", line, span)?;
    let (axis, scale) = split_scale(rest);

    Ok(CapsuleDecl {
        name: name.to_string(),
        center: parse_vec3(center_inner, line, span)?,
        height: parse_expr(height, span)?,
        radius: parse_expr(radius, span)?,
        axis: parse_axis(axis, line, span)?,
        scale: parse_scale(scale, line, span)?,
        span,
    })
}

/// Parse `set name = expr` or `set name = (x, y, z)`
fn parse_set(line: &str, span: Option<Span>) -> Result<SetDecl, ParseError> {
    let rest = &line["set".len()..];
    let (name, value) = split_keyword(rest, " = ", line, span)?;
    if !is_valid_identifier(name) {
        return Err(ParseError::new(format!("Invalid setting name '{}'", name), span));
    }

    // A lone group with three components is a vector; anything else is a scalar expression
    let value = match take_group(value, line, span) {
        Ok((inner, "")) if split_top_level(inner).len() == 3 => {
            SetValue::Vector(parse_vec3(inner, line, span)?)
        }
        _ => SetValue::Scalar(parse_expr(value, span)?),
    };

    Ok(SetDecl {
        name: name.to_string(),
        value,
        span,
    })
}

/// Parse `enable name` / `disable name`
fn parse_feature(line: &str, span: Option<Span>) -> Result<FeatureDecl, ParseError> {
    let mut words = line.split_whitespace();
    let enabled = words.next() == Some("enable");
    let name = words
        .next()
        .ok_or_else(|| ParseError::new(format!("Expected feature name in: {}", line), span))?;
    if words.next().is_some() {
        return Err(ParseError::new(
            format!("Expected a single feature name in: {}", line),
            span,
        ));
    }
    Ok(FeatureDecl {
        name: name.to_string(),
        enabled,
        span,
    })
}

/// Parse `index grid` / `index octree`
fn parse_index(line: &str, span: Option<Span>) -> Result<SpatialStrategy, ParseError> {
    let name = line["index".len()..].trim();
    SpatialStrategy::from_name(name).ok_or_else(|| {
        ParseError::new(
            format!("Unknown index strategy '{}', expected grid or octree", name),
            span,
        )
    })
}

/// Parse `burst at step N duration d`
fn parse_burst(line: &str, span: Option<Span>) -> Result<BurstDecl, ParseError> {
    let rest = line["burst".len()..].trim_start();
    let rest = rest.strip_prefix("at step ").ok_or_else(|| {
        ParseError::new(format!("Expected 'burst at step' in: {}", line), span)
    })?;
    let (step, duration) = split_keyword(rest, " duration ", line, span)?;
    Ok(BurstDecl {
        step: parse_expr(step, span)?,
        duration: parse_expr(duration, span)?,
        span,
    })
}

/// Parse `simulate dt = x steps = n`
fn parse_simulate(line: &str, span: Option<Span>) -> Result<SimulateDecl, ParseError> {
    let rest = &line["simulate".len()..];
    let (_, after_dt) = split_keyword(rest, "dt = ", line, span)?;
    let (dt, steps) = split_keyword(after_dt, " steps = ", line, span)?;
    Ok(SimulateDecl {
        dt: parse_expr(dt, span)?,
        steps: parse_expr(steps, span)?,
    })
}

/// Parse `detect name = lowest_y | highest_y | extent(a) | position(i).a | distance(i, j)`
fn parse_detector(line: &str, span: Option<Span>) -> Result<DetectorDecl, ParseError> {
    let rest = &line["detect".len()..];
    let (name, kind_str) = split_keyword(rest, " = ", line, span)?;
    if !is_valid_identifier(name) {
        return Err(ParseError::new(format!("Invalid detector name '{}'", name), span));
    }

    let kind = if kind_str == "lowest_y" {
        DetectorKind::LowestY
    } else if kind_str == "highest_y" {
        DetectorKind::HighestY
    } else if let Some(args) = kind_str.strip_prefix("extent") {
        let (inner, trailing) = take_group(args, line, span)?;
        if !trailing.is_empty() {
            return Err(ParseError::new(format!("Unexpected '{}' in: {}", trailing, line), span));
        }
        DetectorKind::Extent(parse_axis(inner, line, span)?)
    } else if let Some(args) = kind_str.strip_prefix("position") {
        let (inner, trailing) = take_group(args, line, span)?;
        let axis = trailing.strip_prefix('.').ok_or_else(|| {
            ParseError::new(format!("Expected '.x', '.y' or '.z' after position in: {}", line), span)
        })?;
        DetectorKind::Position {
            index: parse_index_literal(inner, line, span)?,
            axis: parse_axis(axis, line, span)?,
        }
    } else if let Some(args) = kind_str.strip_prefix("distance") {
        let (inner, trailing) = take_group(args, line, span)?;
        if !trailing.is_empty() {
            return Err(ParseError::new(format!("Unexpected '{}' in: {}", trailing, line), span));
        }
        let parts = split_top_level(inner);
        if parts.len() != 2 {
            return Err(ParseError::new(
                format!("Expected two particle indices in distance detector: {}", line),
                span,
            ));
        }
        DetectorKind::Distance {
            a: parse_index_literal(parts[0], line, span)?,
            b: parse_index_literal(parts[1], line, span)?,
        }
    } else {
        return Err(ParseError::new(
            format!("Unknown detector type: {}", kind_str),
            span,
        ));
    };

    Ok(DetectorDecl {
        name: name.to_string(),
        kind,
        span,
    })
}

// ============================================================================
// Expressions
// ============================================================================

/// Parse an expression from a string
/// Grammar: add/sub < mul/div < unary minus < primary
pub fn parse_expr(s: &str, span: Option<Span>) -> Result<Expr, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(ParseError::new("Expected an expression", span));
    }
    parse_expr_add(s, span)
}

/// Rightmost operator among `ops` at paren depth 0, skipping unary minus
fn find_binary_operator(s: &str, ops: &[char]) -> Option<(usize, char)> {
    let mut depth = 0;
    for (i, ch) in s.char_indices().rev() {
        match ch {
            ')' => depth += 1,
            '(' => depth -= 1,
            c if depth == 0 && ops.contains(&c) => {
                if c == '-' || c == '+' {
                    // A sign is binary only when something other than an operator precedes it
                    let prev = s[..i].trim_end().chars().last();
                    match prev {
                        None | Some('(' | ',' | '+' | '-' | '*' | '/') => continue,
                        // Exponent of a float literal such as 1e-3
                        Some('e' | 'E') if s[..i].trim_end().len() == s[..i].len() && is_exponent(&s[..i]) => continue,
                        _ => {}
                    }
                }
                return Some((i, c));
            }
            _ => {}
        }
    }
    None
}

/// Whether `prefix` ends in the mantissa-and-`e` of a float literal
fn is_exponent(prefix: &str) -> bool {
    let token_start = prefix
        .rfind(|c: char| !(c.is_ascii_alphanumeric() || c == '.' || c == '_'))
        .map_or(0, |p| p + 1);
    let token = &prefix[token_start..];
    let mantissa = &token[..token.len() - 1];
    !mantissa.is_empty() && mantissa.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn parse_expr_add(s: &str, span: Option<Span>) -> Result<Expr, ParseError> {
    let s = s.trim();
    match find_binary_operator(s, &['+', '-']) {
        Some((pos, op)) => Ok(Expr::Binary {
            op: if op == '+' { BinaryOp::Add } else { BinaryOp::Sub },
            left: Box::new(parse_expr_add(&s[..pos], span)?),
            right: Box::new(parse_expr_mul(&s[pos + 1..], span)?),
        }),
        None => parse_expr_mul(s, span),
    }
}

fn parse_expr_mul(s: &str, span: Option<Span>) -> Result<Expr, ParseError> {
    let s = s.trim();
    match find_binary_operator(s, &['*', '/']) {
        Some((pos, op)) => Ok(Expr::Binary {
            op: if op == '*' { BinaryOp::Mul } else { BinaryOp::Div },
            left: Box::new(parse_expr_mul(&s[..pos], span)?),
            right: Box::new(parse_expr_unary(&s[pos + 1..], span)?),
        }),
        None => parse_expr_unary(s, span),
    }
}

fn parse_expr_unary(s: &str, span: Option<Span>) -> Result<Expr, ParseError> {
    let s = s.trim();
    match s.strip_prefix('-') {
        Some(inner) if s.parse::<f32>().is_err() => {
            Ok(Expr::UnaryMinus(Box::new(parse_expr_unary(inner, span)?)))
        }
        _ => parse_expr_primary(s, span),
    }
}

/// Literals, variables, function calls, parentheses
fn parse_expr_primary(s: &str, span: Option<Span>) -> Result<Expr, ParseError> {
    let s = s.trim();

    if let Ok(val) = s.parse::<f32>() {
        return Ok(Expr::Literal(val));
    }

    if is_valid_identifier(s) {
        return Ok(Expr::Var(s.to_string()));
    }

    if let Some(paren_pos) = s.find('(') {
        let func_name = s[..paren_pos].trim();
        let (inner, trailing) = take_group(&s[paren_pos..], s, span)?;
        if !trailing.is_empty() {
            return Err(ParseError::new(format!("Invalid expression: {}", s), span));
        }

        if func_name.is_empty() {
            return parse_expr(inner, span);
        }

        let func = match func_name {
            "sin" => FuncName::Sin,
            "cos" => FuncName::Cos,
            "sqrt" => FuncName::Sqrt,
            "clamp" => FuncName::Clamp,
            _ => {
                return Err(ParseError::new(
                    format!("Unknown function '{}'", func_name),
                    span,
                ));
            }
        };

        let args = if inner.trim().is_empty() {
            Vec::new()
        } else {
            split_top_level(inner)
                .into_iter()
                .map(|arg| parse_expr(arg, span))
                .collect::<Result<Vec<_>, _>>()?
        };
        return Ok(Expr::Call { func, args });
    }

    Err(ParseError::new(format!("Invalid expression: {}", s), span))
}

/// Check if a string is a valid identifier
fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}
