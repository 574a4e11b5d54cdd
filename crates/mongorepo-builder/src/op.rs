//! MongoDB operator names
//!
//! See the operator reference at <https://www.mongodb.com/docs/manual/reference/operator/>.

use std::fmt;

/// Query and update operators used by the builders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // Comparison
    /// Matches values that are equal to a specified value.
    Eq,
    /// Matches values that are greater than a specified value.
    Gt,
    /// Matches values that are greater than or equal to a specified value.
    Gte,
    /// Matches any of the values specified in an array.
    In,
    /// Matches values that are less than a specified value.
    Lt,
    /// Matches values that are less than or equal to a specified value.
    Lte,
    /// Matches all values that are not equal to a specified value.
    Ne,
    /// Matches none of the values specified in an array.
    Nin,
    /// Matches values against a regular expression.
    Regex,

    // Element
    /// Matches documents that have the specified field.
    Exists,
    /// Selects documents if a field is of the specified type.
    Type,

    // Logical
    /// Joins query clauses with a logical AND.
    And,
    /// Inverts the effect of a query expression.
    Not,
    /// Joins query clauses with a logical NOR.
    Nor,
    /// Joins query clauses with a logical OR.
    Or,

    // Array
    /// Adds elements to an array only if they do not already exist in the set.
    AddToSet,
    /// Removes the first or last item of an array.
    Pop,
    /// Removes all array elements that match a specified query.
    Pull,
    /// Adds an item to an array.
    Push,
    /// Removes all matching values from an array.
    PullAll,
    /// Matches arrays with at least one element matching all criteria.
    ElemMatch,

    // Field update
    Set,
    Unset,
    Inc,
}

impl Op {
    /// Every operator, in declaration order.
    pub const ALL: [Op; 24] = [
        Op::Eq,
        Op::Gt,
        Op::Gte,
        Op::In,
        Op::Lt,
        Op::Lte,
        Op::Ne,
        Op::Nin,
        Op::Regex,
        Op::Exists,
        Op::Type,
        Op::And,
        Op::Not,
        Op::Nor,
        Op::Or,
        Op::AddToSet,
        Op::Pop,
        Op::Pull,
        Op::Push,
        Op::PullAll,
        Op::ElemMatch,
        Op::Set,
        Op::Unset,
        Op::Inc,
    ];

    /// The `$`-prefixed name MongoDB expects.
    pub fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "$eq",
            Op::Gt => "$gt",
            Op::Gte => "$gte",
            Op::In => "$in",
            Op::Lt => "$lt",
            Op::Lte => "$lte",
            Op::Ne => "$ne",
            Op::Nin => "$nin",
            Op::Regex => "$regex",
            Op::Exists => "$exists",
            Op::Type => "$type",
            Op::And => "$and",
            Op::Not => "$not",
            Op::Nor => "$nor",
            Op::Or => "$or",
            Op::AddToSet => "$addToSet",
            Op::Pop => "$pop",
            Op::Pull => "$pull",
            Op::Push => "$push",
            Op::PullAll => "$pullAll",
            Op::ElemMatch => "$elemMatch",
            Op::Set => "$set",
            Op::Unset => "$unset",
            Op::Inc => "$inc",
        }
    }

    /// Looks an operator up by its `$`-prefixed name.
    pub fn from_name(name: &str) -> Option<Op> {
        Op::ALL.iter().copied().find(|op| op.as_str() == name)
    }

    /// Returns true for the top-level logical operators (`$and`, `$or`, `$nor`).
    pub fn is_logical(&self) -> bool {
        matches!(self, Op::And | Op::Or | Op::Nor)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Op> for String {
    fn from(op: Op) -> Self {
        op.as_str().to_string()
    }
}
