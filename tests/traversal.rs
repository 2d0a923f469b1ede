use std::cell::Cell;
use std::rc::Rc;

use test_log::test;

use millrace::{
    commit, commit_depth_first, commit_topological, make_merge_reader, make_state,
    make_xform_reader, Readable, Writable,
};

/// x feeds a diamond re-converging at a merge node; the counter tracks how
/// often the node on top of the merge recomputes.
fn diamond() -> (millrace::State<i32>, millrace::Reader<i32>, Rc<Cell<usize>>) {
    let x = make_state(1);
    let y = make_xform_reader(|v| v, (x.clone(),));
    let z = make_xform_reader(|v| v, (x.clone(),));
    let w = make_merge_reader((y.clone(), z.clone()));
    let count = Rc::new(Cell::new(0));
    let v = {
        let count = count.clone();
        make_xform_reader(
            move |(a, b): (i32, i32)| {
                count.set(count.get() + 1);
                a + b
            },
            (w.clone(),),
        )
    };
    count.set(0); // discard the construction-time evaluation
    (x, v, count)
}

#[test]
fn diamond_recomputes_once_topological() {
    let (x, v, count) = diamond();

    x.send_up(2);
    commit_topological(&x);

    assert_eq!(count.get(), 1);
    assert_eq!(v.last(), 4);
}

#[test]
fn diamond_recomputes_once_per_path_depth_first() {
    let (x, v, count) = diamond();

    x.send_up(2);
    commit_depth_first(&x);

    assert_eq!(count.get(), 2);
    assert_eq!(v.last(), 4);
}

#[test]
fn merged_transform_visits_once() {
    let a = make_state(0);
    let b = make_state(0);
    let m = make_merge_reader((b.clone(), a.clone()));
    let count = Rc::new(Cell::new(0));
    let tr = {
        let count = count.clone();
        make_xform_reader(
            move |(b, a): (i32, i32)| {
                assert!(a <= b);
                count.set(count.get() + 1);
                b - a
            },
            (m.clone(),),
        )
    };
    count.set(0);

    a.send_up(11);
    b.send_up(21);
    commit((&a, &b));

    assert_eq!(count.get(), 1);
    assert_eq!(tr.last(), 10);
}

#[test]
fn two_independent_graphs_commit_together() {
    let x1 = make_state(0);
    let y1 = make_xform_reader(|v| v + 1, (x1.clone(),));
    let x2 = make_state(0);
    let y2 = make_xform_reader(|v| v + 1, (x2.clone(),));

    // by the time any observer runs, both graphs have settled
    let hits = Rc::new(Cell::new(0));
    let spy = {
        let (y2, hits) = (y2.clone(), hits.clone());
        move |v: &i32| {
            assert_eq!(*v, 11);
            assert_eq!(y2.last(), 21);
            hits.set(hits.get() + 1);
        }
    };
    let _sub = y1.observers().connect(spy);

    x1.send_up(10);
    x2.send_up(20);
    commit((&x1, &x2));

    assert_eq!(hits.get(), 1);
    assert_eq!(y1.last(), 11);
    assert_eq!(y2.last(), 21);
}

#[test]
fn cursor_write_matches_direct_root_writes() {
    use millrace::make_xform_cursor;

    let build = || {
        let a = make_state(1);
        let b = make_state(2);
        let c = make_xform_cursor(
            |(x, y)| x + y,
            |(_, y), v| (v - y, y),
            (a.clone(), b.clone()),
        );
        (a, b, c)
    };

    // through the cursor
    let (a1, b1, c1) = build();
    c1.send_up(10);
    commit((&a1, &b1));

    // decomposed by hand onto the roots
    let (a2, b2, c2) = build();
    a2.send_up(8);
    b2.send_up(2);
    commit((&a2, &b2));

    assert_eq!(a1.last(), a2.last());
    assert_eq!(b1.last(), b2.last());
    assert_eq!(c1.last(), c2.last());
}

#[test]
fn deep_chain_propagates() {
    let x = make_state(0);
    let c1 = make_xform_reader(|v| v + 1, (x.clone(),));
    let c2 = make_xform_reader(|v| v + 1, (c1.clone(),));
    let c3 = make_xform_reader(|v| v + 1, (c2.clone(),));
    let c4 = make_xform_reader(|v| v + 1, (c3.clone(),));
    assert_eq!(c4.rank(), 4);

    x.send_up(100);
    commit(&x);
    assert_eq!(c4.last(), 104);
}

#[test]
fn nested_diamonds_still_recompute_once() {
    // two diamonds stacked on top of each other
    let x = make_state(1);
    let a = make_xform_reader(|v| v, (x.clone(),));
    let b = make_xform_reader(|v| v, (x.clone(),));
    let m1 = make_xform_reader(|(a, b)| a + b, (a.clone(), b.clone()));
    let c = make_xform_reader(|v| v, (m1.clone(),));
    let d = make_xform_reader(|v| v, (m1.clone(),));
    let count = Rc::new(Cell::new(0));
    let m2 = {
        let count = count.clone();
        make_xform_reader(
            move |(c, d): (i32, i32)| {
                count.set(count.get() + 1);
                c + d
            },
            (c.clone(), d.clone()),
        )
    };
    count.set(0);

    x.send_up(3);
    commit(&x);

    assert_eq!(count.get(), 1);
    assert_eq!(m2.last(), 12);
}
