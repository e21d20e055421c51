//! Ring topology generation.
//!
//! Node `m<i>` is attached to shims `b<i>` and `b<i+1>` (wrapping around),
//! and every node joins the single dif `n` through both of its shims.


/// Generate the text configuration of a ring with `size` nodes
pub fn ring_conf(size: usize) -> String {
    let mut out = String::new();
    for i in 0..size {
        let next = (i + 1) % size;
        out.push_str(&format!("eth b{} 0Mbps m{:03} m{:03}\n", i + 1, i + 1, next + 1));
    }
    for i in 0..size {
        let prev = (i + size - 1) % size;
        out.push_str(&format!("dif n m{:03} b{} b{}\n", i + 1, i + 1, prev + 1));
    }
    out
}
