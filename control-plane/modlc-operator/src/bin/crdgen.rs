use kube::core::CustomResourceExt;
use modlc_operator::crd::{Fleet, Manifest, ModuleTemplate};

fn main() {
    let crds = [Fleet::crd(), ModuleTemplate::crd(), Manifest::crd()];
    for (i, crd) in crds.iter().enumerate() {
        if i > 0 {
            println!("---");
        }
        let yaml = serde_yaml::to_string(crd).expect("serialize CRD to YAML");
        print!("{}", yaml);
    }
}
