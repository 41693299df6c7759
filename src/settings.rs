/// Options controlling how the refiner derives and issues predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefinerSettings {
    /// Split weakest-precondition predicates into atoms.
    pub split_predicates: bool,
    /// Split guard predicates into atoms.
    pub split_guards: bool,
    /// Seed the abstraction with all command guards on construction.
    pub add_all_guards: bool,
    /// Split the seeded guards into atoms.
    pub split_initial_guards: bool,
    /// Attach an explanatory trace to the initial states to each refinement.
    pub explain_pivots: bool,
}

impl RefinerSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_split_predicates(mut self, value: bool) -> Self {
        self.split_predicates = value;
        self
    }

    pub fn with_split_guards(mut self, value: bool) -> Self {
        self.split_guards = value;
        self
    }

    pub fn with_add_all_guards(mut self, value: bool) -> Self {
        self.add_all_guards = value;
        self
    }

    pub fn with_split_initial_guards(mut self, value: bool) -> Self {
        self.split_initial_guards = value;
        self
    }

    pub fn with_explain_pivots(mut self, value: bool) -> Self {
        self.explain_pivots = value;
        self
    }

    /// Splits everything the refiner issues.
    pub fn split_all() -> Self {
        Self::default()
            .with_split_predicates(true)
            .with_split_guards(true)
            .with_split_initial_guards(true)
    }
}
