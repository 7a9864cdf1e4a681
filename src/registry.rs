//! External collaborators: the spectral-model registry and the table-model
//! reader. Both are owned by the embedding application; this crate only
//! describes the interfaces it consumes, as Rust traits.

use crate::error::MdefError;

/// Declared type of a registered spectral model component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentType {
    /// Additive model: returns a per-bin integrated photon flux.
    #[default]
    Add,
    /// Multiplicative model: returns a dimensionless factor.
    Mul,
    /// Convolution model: transforms a flux array.
    Con,
    /// Mixing model.
    Mix,
    /// Pile-up model.
    Pileup,
    /// Angular response convolution model.
    Acn,
}

impl ComponentType {
    /// Canonical lowercase name, as used by the external registry and by
    /// table-model prefixes (`atable` -> `Add`, `mtable` -> `Mul`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Add => "add",
            ComponentType::Mul => "mul",
            ComponentType::Con => "con",
            ComponentType::Mix => "mix",
            ComponentType::Pileup => "pileup",
            ComponentType::Acn => "acn",
        }
    }

    /// Parse a declared-type string as used by the registry.
    #[must_use]
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "add" => Some(ComponentType::Add),
            "mul" => Some(ComponentType::Mul),
            "con" => Some(ComponentType::Con),
            "mix" => Some(ComponentType::Mix),
            "pileup" => Some(ComponentType::Pileup),
            "acn" => Some(ComponentType::Acn),
            _ => None,
        }
    }
}

/// Static metadata about a registered spectral model component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Canonical (registry-preserved-case) name.
    pub canonical_name: String,
    /// Declared type.
    pub declared_type: ComponentType,
    /// Whether the component is a user-defined ("mdefine") model rather
    /// than a built-in.
    pub is_user_defined: bool,
    /// Whether the component's behavior depends on the current spectrum
    /// number.
    pub is_spectrum_dependent: bool,
}

/// Signature of a registered model's callable: consumes bin edges and
/// parameters, writes flux and flux-error arrays, for a given spectrum and
/// initialization string.
pub type ModelFn = fn(e: &[f64], params: &[f64], spectrum_number: i32, flux: &mut [f64], flux_err: &mut [f64], init_string: &str);

/// Registry of spectral model components, consumed by the classifier (for
/// name resolution) and the evaluator (for invocation).
pub trait ModelRegistry {
    /// Whether `name` exactly matches a registered component name.
    fn is_exact_match(&self, name: &str) -> bool;

    /// Metadata for a registered component, if any.
    fn component_info(&self, name: &str) -> Option<ComponentInfo>;

    /// Declared parameter count for a registered component.
    fn number_parameters(&self, name: &str) -> Option<usize>;

    /// Whether a component has a callable registered (vs. metadata-only).
    fn has_function_pointer(&self, name: &str) -> bool;

    /// The component's callable, if registered.
    fn function_pointer(&self, name: &str) -> Option<ModelFn>;
}

/// Parameter-count and behavior metadata for a table-model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableInfo {
    /// Number of model parameters stored in the file.
    pub n_pars: usize,
    /// Number of spectra stored in the file.
    pub n_spectra: usize,
    /// Number of energy grid points stored in the file.
    pub n_energies: usize,
    /// Whether the table behaves additively.
    pub is_additive: bool,
    /// Whether the table carries an optional redshift parameter.
    pub is_redshift: bool,
    /// Whether the table carries an optional energy-scale parameter.
    pub is_escale: bool,
    /// Whether parameter interpolation within the table should be performed
    /// in log space rather than linear space.
    pub interp_log: bool,
}

/// Reader for `atable{}`/`mtable{}`/`etable{}` file references, consumed by
/// the validator (for parameter counts) and the evaluator (for
/// interpolation).
pub trait TableModelReader {
    /// Resolve metadata for `filename`, or `Err` if the file cannot be found.
    fn table_info(&self, filename: &str) -> Result<TableInfo, MdefError>;

    /// Interpolate the table at the given parameters and energy grid.
    #[allow(clippy::too_many_arguments, reason = "mirrors the external table-interpolation call signature")]
    fn interpolate(
        &self,
        e: &[f64],
        params: &[f64],
        filename: &str,
        spectrum_number: i32,
        flux: &mut [f64],
        flux_err: &mut [f64],
        init_string: &str,
        table_type: ComponentType,
        interp_log: bool,
    ) -> Result<(), MdefError>;
}
