//! Built-in parameter schemas for every supported DR method

use super::schema::{Field, FieldSpec, FieldValue, MethodSchema, Preset};

macro_rules! fields {
    ($($name:ident : $spec:expr),* $(,)?) => {
        vec![$(Field::new(stringify!($name), $spec)),*]
    };
}

macro_rules! presets {
    ($($preset:ident : { $($field:ident : $value:expr),* $(,)? }),* $(,)?) => {
        vec![$(Preset::new(
            stringify!($preset),
            vec![$((stringify!($field).to_string(), FieldValue::from($value))),*],
        )),*]
    };
}

fn range(min: f64, max: f64, step: f64, default: f64) -> FieldSpec {
    FieldSpec::Range { min, max, step, default }
}

fn select(options: &[&str], default: &str) -> FieldSpec {
    FieldSpec::Select {
        options: options.iter().map(|o| o.to_string()).collect(),
        default: default.to_string(),
    }
}

fn checkbox(default: bool) -> FieldSpec {
    FieldSpec::Checkbox { default }
}

/// Subset selection and seed, appended verbatim to almost every advanced tier
pub fn shared_fields() -> Vec<Field> {
    fields! {
        subset_strategy: select(&["random", "artist_first5"], "random"),
        subset_size: range(10.0, 500.0, 10.0, 250.0),
        random_state: range(0.0, 999.0, 1.0, 42.0),
    }
}

fn with_shared(mut advanced: Vec<Field>) -> Vec<Field> {
    advanced.extend(shared_fields());
    advanced
}

fn method(
    name: &str,
    module: &str,
    basic: Vec<Field>,
    advanced: Vec<Field>,
    presets: Vec<Preset>,
) -> MethodSchema {
    MethodSchema {
        name: name.to_string(),
        module: module.to_string(),
        basic,
        advanced,
        presets,
    }
}

fn n_components(max: f64) -> FieldSpec {
    range(2.0, max, 1.0, 2.0)
}

pub fn builtin_methods() -> Vec<MethodSchema> {
    vec![
        method(
            "UMAP",
            "umap",
            fields! {
                n_neighbors: range(5.0, 50.0, 1.0, 15.0),
                min_dist: range(0.0, 0.4, 0.01, 0.1),
                metric: select(&["euclidean", "cosine", "manhattan"], "euclidean"),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                spread: range(0.5, 2.0, 0.1, 1.0),
                set_op_mix_ratio: range(0.1, 1.0, 0.1, 0.5),
                local_connectivity: range(1.0, 5.0, 1.0, 1.0),
            }),
            presets! {
                fast: { n_neighbors: 10, min_dist: 0.1, set_op_mix_ratio: 1 },
                detail: { n_neighbors: 20, min_dist: 0.05 },
                edge_low_neighbors: { n_neighbors: 2, min_dist: 0 },
                edge_high_neighbors: { n_neighbors: 100, min_dist: 0.99, metric: "cosine", spread: 2 },
            },
        ),
        method(
            "t-SNE",
            "tsne",
            fields! {
                perplexity: range(5.0, 50.0, 1.0, 30.0),
                n_iter: range(250.0, 1000.0, 50.0, 500.0),
                learning_rate: range(50.0, 1000.0, 10.0, 200.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                early_exaggeration: range(8.0, 32.0, 1.0, 12.0),
                early_exaggeration_iter: range(50.0, 500.0, 50.0, 250.0),
                n_iter_without_progress: range(50.0, 500.0, 50.0, 300.0),
                min_grad_norm: range(1e-8, 1e-3, 1e-8, 1e-7),
                theta: range(0.1, 0.8, 0.05, 0.5),
                negative_gradient_method: select(&["fft", "bh"], "fft"),
                initialization: select(&["pca", "random"], "pca"),
                n_jobs: range(1.0, 8.0, 1.0, 1.0),
                metric: select(&["euclidean", "cosine"], "euclidean"),
            }),
            presets! {
                fast: { perplexity: 25, n_iter: 500 },
                edge_low_perplexity: {
                    perplexity: 5, learning_rate: 10, n_iter: 250,
                    early_exaggeration: 4, theta: 0.1, initialization: "random",
                },
                edge_high_perplexity: {
                    perplexity: 100, learning_rate: 1000, n_iter: 1000,
                    early_exaggeration: 32, theta: 0.8, negative_gradient_method: "bh",
                },
            },
        ),
        method(
            "PHATE",
            "phate",
            fields! {
                knn: range(5.0, 50.0, 1.0, 5.0),
                decay: range(2.0, 60.0, 1.0, 40.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                t: select(&["auto", "local"], "auto"),
                gamma: range(0.01, 4.0, 0.01, 1.0),
            }),
            presets! {
                fast: {},
                practical_2: { knn: 15, decay: 20 },
                edge_high_knn: { knn: 50, gamma: 0.1 },
                edge_low_decay: { decay: 2 },
            },
        ),
        method(
            "TriMAP",
            "trimap",
            fields! {
                n_inliers: range(10.0, 30.0, 1.0, 12.0),
                n_outliers: range(2.0, 10.0, 1.0, 4.0),
                n_random: range(1.0, 10.0, 1.0, 3.0),
                n_iters: range(200.0, 1000.0, 50.0, 400.0),
                lr: range(0.05, 0.2, 0.01, 0.1),
            },
            with_shared(fields! {
                weight_temp: range(0.1, 1.0, 0.05, 0.5),
                distance: select(&["euclidean", "cosine", "manhattan"], "euclidean"),
                opt_method: select(&["dbd", "sgd"], "dbd"),
                apply_pca: checkbox(true),
                n_dims: range(2.0, 3.0, 1.0, 2.0),
            }),
            presets! {
                fast: {},
                detail: { n_inliers: 20, n_outliers: 10, n_random: 10, lr: 0.05, n_iters: 1000 },
                safe_inliers_16: { n_inliers: 16 },
                safe_lr_0_05: { lr: 0.05 },
            },
        ),
        method(
            "PaCMAP",
            "pacmap",
            fields! {
                n_neighbors: range(1.0, 30.0, 1.0, 10.0),
                num_iters: range(200.0, 1000.0, 50.0, 450.0),
                lr: range(0.1, 5.0, 0.1, 1.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                MN_ratio: range(0.1, 1.0, 0.05, 0.5),
                FP_ratio: range(0.5, 4.0, 0.1, 2.0),
                apply_pca: checkbox(true),
                preprocess_pca: range(5.0, 50.0, 5.0, 50.0),
                backend: select(&["annoy", "hnswlib"], "annoy"),
                verbose: checkbox(false),
            }),
            presets! {
                fast: {},
                low_neighbors: { n_neighbors: 2 },
                pca20: { preprocess_pca: 20 },
                tiny_subset: { subset_size: 40, n_neighbors: 2 },
            },
        ),
        method(
            "ParamRepulsor",
            "paramrepulsor",
            fields! {
                n_neighbors: range(2.0, 15.0, 1.0, 5.0),
                n_epochs: range(100.0, 600.0, 50.0, 300.0),
                lr: range(0.1, 5.0, 0.1, 1.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                spread: range(0.5, 2.0, 0.1, 1.0),
                repulsion_strength: range(0.5, 2.0, 0.1, 1.0),
                apply_pca: checkbox(true),
                init: select(&["pca", "random"], "pca"),
                verbose: checkbox(false),
            }),
            presets! {
                fast: {},
                artist_first5: { subset_strategy: "artist_first5", subset_size: 500 },
            },
        ),
        method(
            "t-SNE-PSO",
            "tsne_pso",
            fields! {
                perplexity: range(5.0, 50.0, 1.0, 30.0),
                n_iter: range(250.0, 1000.0, 50.0, 500.0),
                n_particles: range(5.0, 20.0, 1.0, 10.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                inertia_weight: range(0.5, 0.9, 0.05, 0.7),
                learning_rate: range(50.0, 1000.0, 10.0, 200.0),
                h: range(1e-22, 1e-18, 1e-22, 1e-20),
                f: range(1e-22, 1e-18, 1e-22, 1e-21),
                use_hybrid: checkbox(true),
                dynamic_weight_adaptation: checkbox(true),
                parameter_optimization: checkbox(true),
                small_dataset_handling: checkbox(true),
                numerical_robustness: checkbox(true),
            }),
            presets! {
                default: {},
                shorter: { n_iter: 400 },
            },
        ),
        method(
            "TSIMCNE",
            "tsimcne",
            fields! {
                epoch_block1: range(100.0, 1000.0, 50.0, 500.0),
                epoch_block2: range(10.0, 500.0, 10.0, 50.0),
                epoch_block3: range(100.0, 1000.0, 50.0, 250.0),
                n_components: n_components(3.0),
            },
            shared_fields(),
            presets! {
                default: {},
                shorter: { epoch_block1: 400, epoch_block3: 200 },
            },
        ),
        method(
            "SpaceMAP",
            "spacemap",
            fields! {
                n_near_field: range(10.0, 100.0, 1.0, 21.0),
                n_middle_field: range(20.0, 80.0, 1.0, 50.0),
                eta: range(0.01, 1.0, 0.05, 0.6),
                n_epochs: range(100.0, 400.0, 50.0, 200.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                d_local: range(0.0, 5.0, 1.0, 0.0),
                d_global: range(1.0, 10.0, 0.5, 4.5),
                init: select(&["spectral", "random"], "spectral"),
                metric: select(&["euclidean", "cosine"], "euclidean"),
                plot_results: checkbox(false),
                num_plots: range(0.0, 100.0, 5.0, 50.0),
                verbose: checkbox(true),
            }),
            presets! {
                fast: {},
                practical_2: {
                    n_near_field: 25, n_middle_field: 60, eta: 0.8, n_epochs: 400, verbose: false,
                },
                edge_high_near: {
                    n_near_field: 100, n_middle_field: 30, d_global: 2, eta: 0.5,
                    n_epochs: 150, init: "random", metric: "cosine",
                },
                edge_low_eta: {
                    n_near_field: 10, n_middle_field: 80, d_local: 2, d_global: 10,
                    eta: 0.01, n_epochs: 300, verbose: false,
                },
            },
        ),
        method(
            "SLISEmap",
            "slisemap",
            fields! {
                radius: range(1.0, 5.0, 0.1, 3.5),
                lasso: range(0.001, 0.1, 0.001, 0.01),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                use_slipmap: checkbox(false),
            }),
            presets! {
                default: {},
                slipmap: { use_slipmap: true, radius: 2 },
            },
        ),
        method(
            "Isomap",
            "isomap",
            fields! {
                n_neighbors: range(2.0, 20.0, 1.0, 5.0),
                n_components: n_components(3.0),
            },
            shared_fields(),
            presets! {
                basic: {},
                edge_low: { n_neighbors: 2 },
                edge_high: { n_neighbors: 20 },
            },
        ),
        method(
            "LLE",
            "lle",
            fields! {
                n_neighbors: range(2.0, 30.0, 1.0, 15.0),
                n_components: n_components(3.0),
            },
            shared_fields(),
            presets! {
                basic: {},
                edge_low: { n_neighbors: 2 },
                edge_high: { n_neighbors: 30 },
            },
        ),
        method(
            "GLLE",
            "glle",
            fields! {
                method: select(&["GLLE", "GLLE_DirectSampling"], "GLLE"),
                k_neighbors: range(5.0, 30.0, 1.0, 10.0),
                max_iterations: range(10.0, 200.0, 10.0, 50.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                n_generation_of_embedding: range(1.0, 5.0, 1.0, 3.0),
                verbosity: checkbox(true),
            }),
            presets! {
                glle_em_fast: {},
                glle_direct_long: {
                    method: "GLLE_DirectSampling", k_neighbors: 15,
                    max_iterations: 100, n_generation_of_embedding: 5,
                },
            },
        ),
        method(
            "Spectral",
            "spectral",
            fields! {
                n_neighbors: range(2.0, 30.0, 1.0, 10.0),
                n_components: n_components(3.0),
            },
            shared_fields(),
            presets! {
                basic: {},
                edge_low: { n_neighbors: 2 },
                edge_high: { n_neighbors: 30 },
            },
        ),
        method(
            "MDS",
            "mds",
            fields! {
                max_iter: range(100.0, 1000.0, 50.0, 300.0),
                n_components: n_components(3.0),
            },
            shared_fields(),
            presets! {
                basic: {},
                long: { max_iter: 1000 },
            },
        ),
        method(
            "Sammon",
            "sammon",
            fields! {
                n_iter: range(100.0, 1000.0, 50.0, 500.0),
                n_components: n_components(3.0),
            },
            with_shared(fields! {
                tol: range(1e-10, 1e-5, 1e-10, 1e-9),
            }),
            presets! {
                test_random: { n_iter: 500 },
            },
        ),
        method(
            "CLMDS",
            "clmds",
            fields! {
                n_clusters: range(2.0, 20.0, 1.0, 5.0),
                max_iter: range(100.0, 1000.0, 50.0, 300.0),
            },
            shared_fields(),
            presets! {
                default: {},
                large_clusters: { n_clusters: 10 },
            },
        ),
        method(
            "PCA",
            "pca",
            fields! { n_components: n_components(50.0) },
            shared_fields(),
            presets! { fast: {} },
        ),
        method(
            "IPCA",
            "ipca",
            fields! { n_components: n_components(50.0) },
            with_shared(fields! {
                batch_size: range(50.0, 500.0, 50.0, 200.0),
            }),
            presets! { fast: {} },
        ),
        method(
            "SVD",
            "svd",
            fields! { n_components: n_components(50.0) },
            shared_fields(),
            presets! { fast: {} },
        ),
        method(
            "FA",
            "fa",
            fields! { n_components: n_components(50.0) },
            shared_fields(),
            presets! { fast: {} },
        ),
        method(
            "ICA",
            "ica",
            fields! {
                n_components: n_components(50.0),
                max_iter: range(200.0, 1000.0, 100.0, 500.0),
            },
            shared_fields(),
            presets! {
                fast: {},
                iter_1000: { max_iter: 1000 },
            },
        ),
        method(
            "DictLearn",
            "dictlearn",
            fields! {
                n_components: n_components(50.0),
                max_iter: range(100.0, 1000.0, 100.0, 300.0),
            },
            shared_fields(),
            presets! { fast: {} },
        ),
        method(
            "Kernel-PCA",
            "kpca",
            fields! {
                n_components: n_components(50.0),
                kernel: select(&["rbf", "poly", "sigmoid", "linear"], "rbf"),
            },
            with_shared(fields! {
                gamma: range(0.01, 10.0, 0.01, 1.0),
                fit_inverse_transform: checkbox(true),
            }),
            presets! {
                fast: {},
                gamma_0_1: { gamma: 0.1 },
            },
        ),
        method(
            "Nyström-PCA",
            "nystroem_pca",
            fields! {
                n_components: n_components(50.0),
                nystroem_components: range(50.0, 2000.0, 50.0, 200.0),
            },
            with_shared(fields! {
                kernel: select(&["rbf", "poly", "sigmoid", "linear"], "rbf"),
                gamma: range(0.01, 10.0, 0.01, 1.0),
            }),
            presets! { fast: {} },
        ),
        method(
            "GRP",
            "grp",
            fields! { n_components: n_components(50.0) },
            with_shared(fields! {
                eps: range(0.05, 0.5, 0.05, 0.1),
            }),
            presets! {
                fast: {},
                eps_0_3: { eps: 0.3 },
            },
        ),
        method(
            "SRP",
            "srp",
            fields! { n_components: n_components(50.0) },
            with_shared(fields! {
                density: range(0.01, 1.0, 0.05, 0.5),
                eps: range(0.05, 0.5, 0.05, 0.1),
            }),
            presets! {
                fast: {},
                density_sparse: { density: 0.05 },
            },
        ),
        method(
            "Agg",
            "agg",
            fields! { n_clusters: range(2.0, 10.0, 1.0, 2.0) },
            shared_fields(),
            presets! { fast: {} },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_fields_are_appended_verbatim() {
        let shared = shared_fields();
        let methods = builtin_methods();
        let with_all = methods
            .iter()
            .filter(|m| m.advanced.ends_with(&shared))
            .count();
        assert_eq!(with_all, methods.len());
    }

    #[test]
    fn test_modules_are_unique_and_lowercase() {
        let methods = builtin_methods();
        let mut modules: Vec<&str> = methods.iter().map(|m| m.module.as_str()).collect();
        assert!(modules
            .iter()
            .all(|m| m.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')));
        modules.sort();
        modules.dedup();
        assert_eq!(modules.len(), methods.len());
    }

    #[test]
    fn test_preset_macro_keeps_order_and_types() {
        let umap = builtin_methods().into_iter().find(|m| m.name == "UMAP").unwrap();
        let edge = umap.preset("edge_high_neighbors").unwrap();
        let names: Vec<&str> = edge.values.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["n_neighbors", "min_dist", "metric", "spread"]);
        assert_eq!(edge.values[0].1, FieldValue::Number(100.0));
        assert_eq!(edge.values[2].1, FieldValue::Text("cosine".into()));
    }
}
