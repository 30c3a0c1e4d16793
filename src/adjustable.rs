use crate::table::Domain;

/// What a tunable field physically is; selects the differencing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    /// Linear position or offset.
    Position,
    /// Tilt, pitch, roll or a ray direction angle.
    Angle,
    Curvature,
    Conic,
    /// Aspheric polynomial coefficient of the given order.
    Polynomial(u32),
    Other,
}

/// A tunable field of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub field: usize,
    pub kind: AttributeKind,
}

impl FieldSpec {
    pub fn new(field: usize, kind: AttributeKind) -> Self {
        Self { field, kind }
    }
}

/// Whether a slave moves with its master or against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sense {
    Same,
    Opposite,
}

impl Sense {
    pub fn sign(self) -> f64 {
        match self {
            Self::Same => 1.0,
            Self::Opposite => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slave {
    pub record: usize,
    pub sense: Sense,
}

impl Slave {
    /// Legacy signed, 1-based encoding: negative for anti-slaves.
    pub fn signed_index(&self) -> isize {
        let index = self.record as isize + 1;
        match self.sense {
            Sense::Same => index,
            Sense::Opposite => -index,
        }
    }
}

/// One independent parameter and the records ganged to it.
#[derive(Debug, Clone, PartialEq)]
pub struct Adjustment {
    pub domain: Domain,
    pub record: usize,
    pub field: usize,
    pub kind: AttributeKind,
    pub slaves: Vec<Slave>,
}

/// Row-major grid of tag characters, one per (record, field).
#[derive(Debug, Clone)]
pub struct TagGrid {
    nrecords: usize,
    nfields: usize,
    tags: Vec<char>,
}

impl TagGrid {
    /// Build a grid from one string per record; short rows are padded with blanks.
    pub fn from_rows(rows: &[&str]) -> Self {
        let nfields = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0);
        let mut tags = Vec::with_capacity(rows.len() * nfields);
        for row in rows {
            let mut n = 0;
            for c in row.chars() {
                tags.push(c);
                n += 1;
            }
            tags.extend(std::iter::repeat(' ').take(nfields - n));
        }
        Self {
            nrecords: rows.len(),
            nfields,
            tags,
        }
    }

    pub fn nrecords(&self) -> usize {
        self.nrecords
    }

    pub fn nfields(&self) -> usize {
        self.nfields
    }

    /// Tag at (record, field); blank outside the grid.
    pub fn tag(&self, record: usize, field: usize) -> char {
        if record < self.nrecords && field < self.nfields {
            self.tags[record * self.nfields + field]
        } else {
            ' '
        }
    }
}

/// Tags and tunable fields of one table.
#[derive(Debug, Clone, Copy)]
pub struct DomainTags<'a> {
    pub domain: Domain,
    pub grid: &'a TagGrid,
    pub fields: &'a [FieldSpec],
}

fn opens_adjustable(tag: char) -> bool {
    tag == '?' || tag.is_ascii_alphabetic()
}

fn discover_domain(tags: &DomainTags<'_>, out: &mut Vec<Adjustment>) {
    let grid = tags.grid;
    let mut visited = vec![false; grid.nrecords()];
    for spec in tags.fields {
        visited.fill(false);
        for record in 0..grid.nrecords() {
            let tag = grid.tag(record, spec.field);
            if visited[record] || !opens_adjustable(tag) {
                continue;
            }
            visited[record] = true;
            let mut slaves = Vec::new();
            if tag.is_ascii_alphabetic() {
                for later in record + 1..grid.nrecords() {
                    if visited[later] {
                        continue;
                    }
                    let other = grid.tag(later, spec.field);
                    if !other.eq_ignore_ascii_case(&tag) {
                        continue;
                    }
                    visited[later] = true;
                    let sense = if other == tag {
                        Sense::Same
                    } else {
                        Sense::Opposite
                    };
                    slaves.push(Slave {
                        record: later,
                        sense,
                    });
                }
            }
            out.push(Adjustment {
                domain: tags.domain,
                record,
                field: spec.field,
                kind: spec.kind,
                slaves,
            });
        }
    }
}

/// Ordered adjustables; the order fixes positions in the parameter vector.
#[derive(Debug, Clone, Default)]
pub struct AdjustableSet {
    adjustments: Vec<Adjustment>,
}

impl AdjustableSet {
    /// Scan tag grids for adjustables, masters first in field-then-record order.
    pub fn discover(tables: &[DomainTags<'_>]) -> Self {
        let mut adjustments = Vec::new();
        for tags in tables {
            discover_domain(tags, &mut adjustments);
        }
        adjustments.sort_by_key(|a| a.domain);
        Self { adjustments }
    }

    pub fn from_adjustments(mut adjustments: Vec<Adjustment>) -> Self {
        adjustments.sort_by_key(|a| a.domain);
        Self { adjustments }
    }

    pub fn len(&self) -> usize {
        self.adjustments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adjustments.is_empty()
    }

    pub fn count(&self, domain: Domain) -> usize {
        self.adjustments.iter().filter(|a| a.domain == domain).count()
    }

    pub fn adjustments(&self) -> &[Adjustment] {
        &self.adjustments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Adjustment> {
        self.adjustments.iter()
    }
}
